//! Type tags for type-erased product values.

use std::any::{Any, TypeId};
use std::fmt;

/// The runtime identity of a product type.
///
/// Equality is exact type identity; the name exists only for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeTag {
	id: TypeId,
	name: &'static str,
}

impl TypeTag {
	pub fn of<T: Any>() -> Self {
		Self {
			id: TypeId::of::<T>(),
			name: std::any::type_name::<T>(),
		}
	}

	pub fn name(&self) -> &'static str {
		self.name
	}
}

impl PartialEq for TypeTag {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for TypeTag {}

impl std::hash::Hash for TypeTag {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl fmt::Debug for TypeTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name)
	}
}

impl fmt::Display for TypeTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name)
	}
}
