//! The in-memory storage backend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use strata_model::TypeTag;

use crate::error::{FormError, Result};
use crate::placement::{Placement, Token};
use crate::storage::{OpaqueValue, Storage};

struct MemoryContainer {
	tag: TypeTag,
	staged: Option<OpaqueValue>,
	rows: Vec<(String, OpaqueValue)>,
}

/// Containers keyed by file and container name, rows keyed by commit id.
#[derive(Default)]
pub struct MemoryStorage {
	containers: Mutex<HashMap<(String, String), MemoryContainer>>,
}

fn key(file_name: &str, container_name: &str) -> (String, String) {
	(file_name.to_owned(), container_name.to_owned())
}

impl MemoryStorage {
	fn with_container<R>(
		&self,
		file_name: &str,
		container_name: &str,
		f: impl FnOnce(&mut MemoryContainer) -> Result<R>,
	) -> Result<R> {
		let mut containers = self.containers.lock();
		let container = containers
			.get_mut(&key(file_name, container_name))
			.ok_or_else(|| FormError::UnknownContainer {
				container: container_name.to_owned(),
			})?;
		f(container)
	}
}

impl Storage for MemoryStorage {
	fn create_containers(&self, requested: &[(Placement, TypeTag)]) -> Result<()> {
		let mut containers = self.containers.lock();
		for (placement, tag) in requested {
			containers
				.entry(key(placement.file_name(), placement.container_name()))
				.or_insert_with(|| MemoryContainer {
					tag: *tag,
					staged: None,
					rows: Vec::new(),
				});
		}
		Ok(())
	}

	fn fill(&self, placement: &Placement, value: OpaqueValue, tag: TypeTag) -> Result<()> {
		self.with_container(
			placement.file_name(),
			placement.container_name(),
			|container| {
				if container.tag != tag {
					return Err(FormError::TypeMismatch {
						container: placement.container_name().to_owned(),
						stored: container.tag.name(),
						requested: tag.name(),
					});
				}
				container.staged = Some(value);
				Ok(())
			},
		)
	}

	fn commit(&self, placement: &Placement, id: &str) -> Result<()> {
		self.with_container(
			placement.file_name(),
			placement.container_name(),
			|container| {
				let value =
					container
						.staged
						.take()
						.ok_or_else(|| FormError::NothingStaged {
							container: placement.container_name().to_owned(),
						})?;
				container.rows.push((id.to_owned(), value));
				Ok(())
			},
		)
	}

	fn row_for(&self, token: &Token, id: &str) -> Result<usize> {
		self.with_container(token.file_name(), token.container_name(), |container| {
			container
				.rows
				.iter()
				.position(|(row_id, _)| row_id == id)
				.ok_or_else(|| FormError::MissingEntry {
					container: token.container_name().to_owned(),
					id: id.to_owned(),
				})
		})
	}

	fn read(&self, token: &Token, tag: TypeTag) -> Result<OpaqueValue> {
		self.with_container(token.file_name(), token.container_name(), |container| {
			if container.tag != tag {
				return Err(FormError::TypeMismatch {
					container: token.container_name().to_owned(),
					stored: container.tag.name(),
					requested: tag.name(),
				});
			}
			let row = token.row().ok_or_else(|| FormError::MissingEntry {
				container: token.container_name().to_owned(),
				id: String::from("<no row>"),
			})?;
			container
				.rows
				.get(row)
				.map(|(_, value)| Arc::clone(value))
				.ok_or_else(|| FormError::MissingEntry {
					container: token.container_name().to_owned(),
					id: row.to_string(),
				})
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn placement() -> Placement {
		Placement::new("run.mem", "tracks", crate::technology::Technology::Memory)
	}

	#[test]
	fn fill_commit_read_round_trip() {
		let storage = MemoryStorage::default();
		let place = placement();
		storage
			.create_containers(&[(place.clone(), TypeTag::of::<u32>())])
			.unwrap();

		storage
			.fill(&place, Arc::new(42u32), TypeTag::of::<u32>())
			.unwrap();
		storage.commit(&place, "[run:0]").unwrap();

		let token = Token::for_placement(&place);
		let row = storage.row_for(&token, "[run:0]").unwrap();
		let value = storage
			.read(&token.with_row(row), TypeTag::of::<u32>())
			.unwrap();
		assert_eq!(*value.downcast::<u32>().unwrap(), 42);
	}

	#[test]
	fn commit_without_fill_fails() {
		let storage = MemoryStorage::default();
		let place = placement();
		storage
			.create_containers(&[(place.clone(), TypeTag::of::<u32>())])
			.unwrap();
		assert!(matches!(
			storage.commit(&place, "[run:0]"),
			Err(FormError::NothingStaged { .. })
		));
	}

	#[test]
	fn reads_validate_exact_type_identity() {
		let storage = MemoryStorage::default();
		let place = placement();
		storage
			.create_containers(&[(place.clone(), TypeTag::of::<u32>())])
			.unwrap();
		let result = storage.fill(&place, Arc::new(1i64), TypeTag::of::<i64>());
		assert!(matches!(result, Err(FormError::TypeMismatch { .. })));
	}
}
