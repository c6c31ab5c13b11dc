//! The storage capability: containers, staged fills, committed rows.

use std::any::Any;
use std::sync::Arc;

use strata_model::TypeTag;

use crate::error::Result;
use crate::memory::MemoryStorage;
use crate::placement::{Placement, Token};
use crate::technology::Technology;

/// A type-erased stored value.
pub type OpaqueValue = Arc<dyn Any + Send + Sync>;

/// One storage backend.
///
/// Writing is two-phase: `fill` stages a value in its container, `commit`
/// appends the staged value as a row identified by `id`. Reading resolves
/// an id to a row with `row_for` and fetches it with `read`, which must
/// validate exact type identity against the container's declared type.
pub trait Storage: Send + Sync {
	fn create_containers(&self, containers: &[(Placement, TypeTag)]) -> Result<()>;

	fn fill(&self, placement: &Placement, value: OpaqueValue, tag: TypeTag) -> Result<()>;

	fn commit(&self, placement: &Placement, id: &str) -> Result<()>;

	fn row_for(&self, token: &Token, id: &str) -> Result<usize>;

	fn read(&self, token: &Token, tag: TypeTag) -> Result<OpaqueValue>;
}

/// Chooses the concrete backend for a technology tag.
pub fn create_storage(technology: Technology) -> Box<dyn Storage> {
	match technology {
		Technology::Memory => Box::new(MemoryStorage::default()),
	}
}
