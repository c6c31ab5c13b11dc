//! Typed views onto stored products.

use std::ops::Deref;
use std::sync::Arc;

use crate::index::IndexRef;
use crate::products::ProductValue;

/// A typed, shared view of one product together with its origin index.
///
/// Handles are the argument type bound into user callables; they keep the
/// underlying store's value alive without copying it.
#[derive(Clone)]
pub struct Handle<T> {
	value: Arc<T>,
	index: IndexRef,
}

impl<T: ProductValue> Handle<T> {
	pub fn new(value: Arc<T>, index: IndexRef) -> Self {
		Self { value, index }
	}

	/// The index of the cell this product belongs to.
	pub fn index(&self) -> &IndexRef {
		&self.index
	}
}

impl<T> Deref for Handle<T> {
	type Target = T;

	fn deref(&self) -> &T {
		&self.value
	}
}
