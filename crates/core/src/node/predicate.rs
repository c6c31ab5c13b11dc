//! Predicates: decide true or false per message id; gates subscribe.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc::UnboundedSender;

use crate::error::Error;
use crate::message::{InputSet, Message, PredicateVerdict, most_derived};
use crate::node::RunState;
use crate::ports::GateEvent;

pub(crate) type PredicateRunner = Arc<dyn Fn(&[Message]) -> Result<bool, Error> + Send + Sync>;

pub(crate) struct PredicateNode {
	pub runner: PredicateRunner,
	pub subscribers: Vec<UnboundedSender<GateEvent>>,
	pub calls: Arc<AtomicUsize>,
}

impl PredicateNode {
	pub fn process(&self, set: InputSet, state: &RunState) {
		match (self.runner)(&set) {
			Ok(accepted) => {
				self.calls.fetch_add(1, Ordering::Relaxed);
				let verdict = PredicateVerdict {
					id: most_derived(&set).id,
					accepted,
				};
				for subscriber in &self.subscribers {
					let _ = subscriber.send(GateEvent::Verdict(verdict));
				}
			}
			Err(error) => state.fail(error),
		}
	}
}
