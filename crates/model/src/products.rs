//! The type-erased product bag.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::ProductError;
use crate::identifier::Identifier;
use crate::tag::TypeTag;

/// Anything that may be stored as a product.
pub trait ProductValue: Any + Send + Sync {}

impl<T: Any + Send + Sync> ProductValue for T {}

/// One stored product: a shared value plus its type tag.
#[derive(Clone)]
pub struct ProductEntry {
	value: Arc<dyn Any + Send + Sync>,
	tag: TypeTag,
}

impl ProductEntry {
	pub fn new<T: ProductValue>(value: T) -> Self {
		Self {
			value: Arc::new(value),
			tag: TypeTag::of::<T>(),
		}
	}

	pub fn from_shared(value: Arc<dyn Any + Send + Sync>, tag: TypeTag) -> Self {
		Self { value, tag }
	}

	pub fn tag(&self) -> TypeTag {
		self.tag
	}

	pub fn value(&self) -> &Arc<dyn Any + Send + Sync> {
		&self.value
	}

	/// Downcasts the shared value, reporting the stored type on mismatch.
	pub fn downcast<T: ProductValue>(&self, product: &str) -> Result<Arc<T>, ProductError> {
		Arc::clone(&self.value)
			.downcast::<T>()
			.map_err(|_| ProductError::TypeMismatch {
				product: product.to_owned(),
				expected: TypeTag::of::<T>().name(),
				found: self.tag.name(),
			})
	}
}

/// Mapping from product name to value, iterated in insertion order.
///
/// Insertion order matters: output sinks walk the bag and must observe
/// products in the order their creator added them.
#[derive(Clone, Default)]
pub struct Products {
	entries: IndexMap<Identifier, ProductEntry>,
}

impl Products {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add<T: ProductValue>(&mut self, name: impl Into<Identifier>, value: T) {
		self.add_entry(name, ProductEntry::new(value));
	}

	pub fn add_entry(&mut self, name: impl Into<Identifier>, entry: ProductEntry) {
		self.entries.insert(name.into(), entry);
	}

	pub fn contains(&self, name: &Identifier) -> bool {
		self.entries.contains_key(name)
	}

	pub fn entry(&self, name: &Identifier) -> Result<&ProductEntry, ProductError> {
		self.entries
			.get(name)
			.ok_or_else(|| ProductError::NoSuchProduct {
				product: name.as_str().to_owned(),
			})
	}

	pub fn get<T: ProductValue>(&self, name: &Identifier) -> Result<Arc<T>, ProductError> {
		self.entry(name)?.downcast(name.as_str())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &ProductEntry)> {
		self.entries.iter()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
