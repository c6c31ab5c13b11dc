//! Observers: consume a matched tuple, publish nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Error;
use crate::message::{InputSet, Message};
use crate::node::RunState;

pub(crate) type ObserverRunner = Arc<dyn Fn(&[Message]) -> Result<(), Error> + Send + Sync>;

pub(crate) struct ObserverNode {
	pub runner: ObserverRunner,
	pub calls: Arc<AtomicUsize>,
}

impl ObserverNode {
	pub fn process(&self, set: InputSet, state: &RunState) {
		match (self.runner)(&set) {
			Ok(()) => {
				self.calls.fetch_add(1, Ordering::Relaxed);
			}
			Err(error) => state.fail(error),
		}
	}
}
