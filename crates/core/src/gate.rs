//! Predicate gates.
//!
//! A gated consumer's inputs all flow through one gate, which buffers them
//! by message id until every declared predicate has reported. All true:
//! each buffered message is forwarded to the port its query belongs to.
//! Any false: the input is dropped, though remaining decisions are still
//! consumed so the id's state can be erased once both sides are complete.

use rustc_hash::FxHashMap;
use strata_model::StoreRef;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::trace;

use crate::message::{Message, PredicateVerdict};
use crate::ports::{GateEvent, PortFn};
use crate::query::ProductQuery;

struct Decision {
	remaining: usize,
	rejected: bool,
}

pub(crate) struct GateState {
	node_name: String,
	predicate_count: usize,
	queries: Vec<ProductQuery>,
	ports: Vec<PortFn>,
	decisions: FxHashMap<u64, Decision>,
	data: FxHashMap<u64, Vec<Option<Message>>>,
}

impl GateState {
	pub fn new(
		node_name: String,
		predicate_count: usize,
		queries: Vec<ProductQuery>,
		ports: Vec<PortFn>,
	) -> Self {
		Self {
			node_name,
			predicate_count,
			queries,
			ports,
			decisions: FxHashMap::default(),
			data: FxHashMap::default(),
		}
	}

	pub fn handle(&mut self, event: GateEvent) {
		match event {
			GateEvent::Verdict(verdict) => {
				let count = self.predicate_count;
				let decision = self.decisions.entry(verdict.id).or_insert(Decision {
					remaining: count,
					rejected: false,
				});
				decision.remaining = decision.remaining.saturating_sub(1);
				if !verdict.accepted {
					decision.rejected = true;
				}
				self.resolve(verdict.id);
			}
			GateEvent::Data(message) => {
				let Some(slot) = self.slot_for(&message.store) else {
					trace!(
						node = %self.node_name,
						source = %message.store.source(),
						"gated message matches no input query"
					);
					return;
				};
				let id = message.id;
				let width = self.queries.len();
				let entry = self.data.entry(id).or_insert_with(|| vec![None; width]);
				entry[slot] = Some(message);
				self.resolve(id);
			}
		}
	}

	fn slot_for(&self, store: &StoreRef) -> Option<usize> {
		self.queries.iter().position(|query| {
			query
				.suffix_name()
				.is_some_and(|name| store.contains_product(name))
		})
	}

	fn resolve(&mut self, id: u64) {
		let Some(decision) = self.decisions.get(&id) else {
			return;
		};
		let decided = decision.remaining == 0;
		let rejected = decision.rejected;
		let data_complete = self
			.data
			.get(&id)
			.is_some_and(|slots| slots.iter().all(Option::is_some));

		if rejected {
			// Drop, but only erase once every predicate has reported and the
			// input set is assembled; stragglers must still find the state.
			if decided && data_complete {
				self.decisions.remove(&id);
				self.data.remove(&id);
			}
			return;
		}

		if decided && data_complete {
			self.decisions.remove(&id);
			if let Some(slots) = self.data.remove(&id) {
				for (slot, message) in slots.into_iter().enumerate() {
					if let Some(message) = message {
						(self.ports[slot])(message);
					}
				}
			}
		}
	}
}

pub(crate) async fn run_gate(mut rx: UnboundedReceiver<GateEvent>, mut state: GateState) {
	while let Some(event) = rx.recv().await {
		state.handle(event);
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use parking_lot::Mutex;
	use strata_model::{DataCellIndex, ProductStore, Products};

	use super::*;

	fn message(id: u64, product: &str) -> Message {
		let index = DataCellIndex::base().make_child(id, "event");
		let mut products = Products::new();
		products.add(product, id as u32);
		Message {
			store: Arc::new(ProductStore::new(index, "provide", products)),
			id,
		}
	}

	fn gate(predicates: usize, products: &[&str]) -> (GateState, Arc<Mutex<Vec<(usize, u64)>>>) {
		let seen: Arc<Mutex<Vec<(usize, u64)>>> = Arc::new(Mutex::new(Vec::new()));
		let queries: Vec<_> = products
			.iter()
			.map(|p| ProductQuery::new("provide", "event").suffix(*p))
			.collect();
		let ports: Vec<PortFn> = (0..products.len())
			.map(|slot| {
				let captured = Arc::clone(&seen);
				let port: PortFn = Arc::new(move |m: Message| captured.lock().push((slot, m.id)));
				port
			})
			.collect();
		(GateState::new("add".into(), predicates, queries, ports), seen)
	}

	#[test]
	fn forwards_when_all_predicates_accept() {
		let (mut state, seen) = gate(2, &["num"]);
		state.handle(GateEvent::Data(message(1, "num")));
		state.handle(GateEvent::Verdict(PredicateVerdict {
			id: 1,
			accepted: true,
		}));
		assert!(seen.lock().is_empty());

		state.handle(GateEvent::Verdict(PredicateVerdict {
			id: 1,
			accepted: true,
		}));
		assert_eq!(seen.lock().as_slice(), &[(0, 1)]);
		assert!(state.decisions.is_empty());
		assert!(state.data.is_empty());
	}

	#[test]
	fn one_rejection_drops_the_input() {
		let (mut state, seen) = gate(2, &["num"]);
		state.handle(GateEvent::Data(message(1, "num")));
		state.handle(GateEvent::Verdict(PredicateVerdict {
			id: 1,
			accepted: false,
		}));
		// The second decision still arrives and must be consumed.
		state.handle(GateEvent::Verdict(PredicateVerdict {
			id: 1,
			accepted: true,
		}));
		assert!(seen.lock().is_empty());
		assert!(state.decisions.is_empty());
		assert!(state.data.is_empty());
	}

	#[test]
	fn decisions_may_precede_data() {
		let (mut state, seen) = gate(1, &["num"]);
		state.handle(GateEvent::Verdict(PredicateVerdict {
			id: 3,
			accepted: true,
		}));
		assert!(seen.lock().is_empty());
		state.handle(GateEvent::Data(message(3, "num")));
		assert_eq!(seen.lock().as_slice(), &[(0, 3)]);
	}

	#[test]
	fn multi_input_sets_route_to_their_slots() {
		let (mut state, seen) = gate(1, &["num", "other"]);
		state.handle(GateEvent::Data(message(2, "other")));
		state.handle(GateEvent::Verdict(PredicateVerdict {
			id: 2,
			accepted: true,
		}));
		state.handle(GateEvent::Data(message(2, "num")));

		let mut forwarded = seen.lock().clone();
		forwarded.sort_unstable();
		assert_eq!(forwarded, [(0, 2), (1, 2)]);
	}
}
