//! Transforms: consume a matched tuple, publish a new product.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use strata_model::{Identifier, ProductEntry, ProductStore, Products};

use crate::error::Error;
use crate::message::{InputSet, Message, most_derived};
use crate::node::RunState;
use crate::ports::PortFn;

pub(crate) type TransformRunner = Arc<dyn Fn(&[Message]) -> Result<ProductEntry, Error> + Send + Sync>;

pub(crate) struct TransformNode {
	pub name: Identifier,
	pub output_name: Identifier,
	pub runner: TransformRunner,
	pub outputs: Vec<PortFn>,
	pub calls: Arc<AtomicUsize>,
}

impl TransformNode {
	pub fn process(&self, set: InputSet, state: &RunState) {
		match (self.runner)(&set) {
			Ok(entry) => {
				let origin = most_derived(&set);
				let mut products = Products::new();
				products.add_entry(self.output_name.clone(), entry);
				let store = Arc::new(ProductStore::new(
					Arc::clone(origin.store.index()),
					self.name.clone(),
					products,
				));
				self.calls.fetch_add(1, Ordering::Relaxed);
				let outgoing = Message {
					store,
					id: origin.id,
				};
				for port in &self.outputs {
					port(outgoing.clone());
				}
			}
			Err(error) => state.fail(error),
		}
	}
}
