//! Output sinks: receive every published store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use strata_model::StoreRef;

use crate::error::Error;
use crate::message::Message;
use crate::node::RunState;

pub(crate) type OutputRunner = Arc<dyn Fn(&StoreRef) -> Result<(), Error> + Send + Sync>;

pub(crate) struct OutputNode {
	pub runner: OutputRunner,
	pub calls: Arc<AtomicUsize>,
}

impl OutputNode {
	pub fn process(&self, message: Message, state: &RunState) {
		match (self.runner)(&message.store) {
			Ok(()) => {
				self.calls.fetch_add(1, Ordering::Relaxed);
			}
			Err(error) => state.fail(error),
		}
	}
}
