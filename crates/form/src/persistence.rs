//! The creator-oriented persistence layer over [`Storage`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use strata_model::TypeTag;

use crate::error::{FormError, Result};
use crate::placement::{Placement, Token};
use crate::storage::{OpaqueValue, Storage, create_storage};
use crate::technology::Technology;

/// The write/read interface output modules talk to.
///
/// Containers are keyed by the creating node and the product label; a
/// commit seals everything registered since the last commit under one id
/// (conventionally the cell index rendered as a string).
pub trait Persistence: Send + Sync {
	fn create_containers(&self, creator: &str, products: &[(String, TypeTag)]) -> Result<()>;

	fn register_write(
		&self,
		creator: &str,
		label: &str,
		value: OpaqueValue,
		tag: TypeTag,
	) -> Result<()>;

	fn commit(&self, creator: &str, id: &str) -> Result<()>;

	fn read(&self, creator: &str, label: &str, id: &str, tag: TypeTag) -> Result<OpaqueValue>;
}

/// Builds a persistence handle writing to `output_name` via the backend
/// the technology tag selects.
pub fn create_persistence(technology: Technology, output_name: &str) -> Arc<dyn Persistence> {
	Arc::new(StoragePersistence {
		storage: create_storage(technology),
		output_name: output_name.to_owned(),
		technology,
		placements: Mutex::new(HashMap::new()),
	})
}

fn container_name(creator: &str, label: &str) -> String {
	format!("{creator}/{label}")
}

struct StoragePersistence {
	storage: Box<dyn Storage>,
	output_name: String,
	technology: Technology,
	placements: Mutex<HashMap<(String, String), Placement>>,
}

impl StoragePersistence {
	fn placement_for(&self, creator: &str, label: &str) -> Result<Placement> {
		self.placements
			.lock()
			.get(&(creator.to_owned(), label.to_owned()))
			.cloned()
			.ok_or_else(|| FormError::UnknownContainer {
				container: container_name(creator, label),
			})
	}

	fn committed_for(&self, creator: &str) -> Vec<Placement> {
		self.placements
			.lock()
			.iter()
			.filter(|((c, _), _)| c == creator)
			.map(|(_, placement)| placement.clone())
			.collect()
	}
}

impl Persistence for StoragePersistence {
	fn create_containers(&self, creator: &str, products: &[(String, TypeTag)]) -> Result<()> {
		let mut requested = Vec::with_capacity(products.len());
		{
			let mut placements = self.placements.lock();
			for (label, tag) in products {
				let placement = placements
					.entry((creator.to_owned(), label.clone()))
					.or_insert_with(|| {
						Placement::new(
							&self.output_name,
							&container_name(creator, label),
							self.technology,
						)
					});
				requested.push((placement.clone(), *tag));
			}
		}
		self.storage.create_containers(&requested)
	}

	fn register_write(
		&self,
		creator: &str,
		label: &str,
		value: OpaqueValue,
		tag: TypeTag,
	) -> Result<()> {
		let placement = self.placement_for(creator, label)?;
		self.storage.fill(&placement, value, tag)
	}

	fn commit(&self, creator: &str, id: &str) -> Result<()> {
		for placement in self.committed_for(creator) {
			self.storage.commit(&placement, id)?;
		}
		Ok(())
	}

	fn read(&self, creator: &str, label: &str, id: &str, tag: TypeTag) -> Result<OpaqueValue> {
		let placement = self.placement_for(creator, label)?;
		let token = Token::for_placement(&placement);
		let row = self.storage.row_for(&token, id)?;
		self.storage.read(&token.with_row(row), tag)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trip_through_the_memory_backend() {
		let sink = create_persistence(Technology::Memory, "demo.mem");
		sink.create_containers(
			"clamp",
			&[(String::from("waves"), TypeTag::of::<Vec<u32>>())],
		)
		.unwrap();

		sink.register_write(
			"clamp",
			"waves",
			Arc::new(vec![1u32, 2, 3]),
			TypeTag::of::<Vec<u32>>(),
		)
		.unwrap();
		sink.commit("clamp", "[run:0, event:1]").unwrap();

		let value = sink
			.read("clamp", "waves", "[run:0, event:1]", TypeTag::of::<Vec<u32>>())
			.unwrap();
		assert_eq!(*value.downcast::<Vec<u32>>().unwrap(), vec![1, 2, 3]);
	}

	#[test]
	fn writing_to_an_undeclared_container_fails() {
		let sink = create_persistence(Technology::Memory, "demo.mem");
		let result = sink.register_write("clamp", "waves", Arc::new(1u32), TypeTag::of::<u32>());
		assert!(matches!(result, Err(FormError::UnknownContainer { .. })));
	}
}
