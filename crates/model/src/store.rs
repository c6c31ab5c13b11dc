//! Product stores: one bag of products bound to one cell index.

use std::sync::Arc;

use crate::error::ProductError;
use crate::handle::Handle;
use crate::identifier::Identifier;
use crate::index::{DataCellIndex, IndexRef};
use crate::products::{ProductValue, Products};

/// Shared reference to a published, immutable [`ProductStore`].
pub type StoreRef = Arc<ProductStore>;

/// The products one node created for one data cell.
///
/// A store is assembled by its creator and then frozen behind a [`StoreRef`];
/// once published into a message its product set never changes.
pub struct ProductStore {
	index: IndexRef,
	source: Identifier,
	products: Products,
}

impl ProductStore {
	pub fn new(index: IndexRef, source: impl Into<Identifier>, products: Products) -> Self {
		Self {
			index,
			source: source.into(),
			products,
		}
	}

	/// An empty store bound to the base index.
	pub fn base(source: impl Into<Identifier>) -> StoreRef {
		Arc::new(Self::new(
			Arc::clone(DataCellIndex::base()),
			source,
			Products::new(),
		))
	}

	pub fn index(&self) -> &IndexRef {
		&self.index
	}

	/// Name of the node that created this store.
	pub fn source(&self) -> &Identifier {
		&self.source
	}

	pub fn layer_name(&self) -> &Identifier {
		self.index.layer_name()
	}

	pub fn products(&self) -> &Products {
		&self.products
	}

	pub fn contains_product(&self, name: &Identifier) -> bool {
		self.products.contains(name)
	}

	pub fn get_handle<T: ProductValue>(&self, name: &Identifier) -> Result<Handle<T>, ProductError> {
		let value = self.products.get::<T>(name)?;
		Ok(Handle::new(value, Arc::clone(&self.index)))
	}
}

/// Of two stores, the one whose index sits deeper in the hierarchy.
pub fn more_derived<'a>(a: &'a StoreRef, b: &'a StoreRef) -> &'a StoreRef {
	if a.index().depth() > b.index().depth() {
		a
	} else {
		b
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn handles_carry_the_origin_index() {
		let index = DataCellIndex::base().make_child(4, "event");
		let mut products = Products::new();
		products.add("num", 7u32);
		let store = ProductStore::new(Arc::clone(&index), "provide_num", products);

		let handle = store.get_handle::<u32>(&Identifier::new("num")).unwrap();
		assert_eq!(*handle, 7);
		assert_eq!(handle.index().hash(), index.hash());
	}

	#[test]
	fn more_derived_prefers_depth() {
		let run = DataCellIndex::base().make_child(0, "run");
		let event = run.make_child(0, "event");
		let shallow = Arc::new(ProductStore::new(run, "a", Products::new()));
		let deep = Arc::new(ProductStore::new(event, "b", Products::new()));
		assert_eq!(
			more_derived(&shallow, &deep).index().depth(),
			deep.index().depth()
		);
	}
}
