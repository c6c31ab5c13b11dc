//! Providers: produce one product per routed index of their layer.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use strata_model::{Identifier, IndexRef, ProductEntry, ProductStore, Products};

use crate::error::Error;
use crate::message::{IndexMessage, Message};
use crate::node::RunState;
use crate::ports::PortFn;

pub(crate) type ProviderRunner = Arc<dyn Fn(&IndexRef) -> Result<ProductEntry, Error> + Send + Sync>;

pub(crate) struct ProviderNode {
	pub name: Identifier,
	pub product_name: Identifier,
	pub runner: ProviderRunner,
	pub outputs: Vec<PortFn>,
	pub calls: Arc<AtomicUsize>,
}

impl ProviderNode {
	pub fn process(&self, message: IndexMessage, state: &RunState) {
		match (self.runner)(&message.index) {
			Ok(entry) => {
				let mut products = Products::new();
				products.add_entry(self.product_name.clone(), entry);
				let store = Arc::new(ProductStore::new(
					message.index,
					self.name.clone(),
					products,
				));
				self.calls.fetch_add(1, Ordering::Relaxed);
				let outgoing = Message {
					store,
					id: message.id,
				};
				for port in &self.outputs {
					port(outgoing.clone());
				}
			}
			Err(error) => state.fail(error),
		}
	}
}
