//! Tag-matching joins.
//!
//! Messages are grouped by the id the router (or an unfold) assigned; a
//! tuple is forwarded once every slot holds a message with the same id.
//! Partial tuples left over at shutdown are dropped with the join.

use rustc_hash::FxHashMap;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::message::Message;
use crate::ports::SetFn;

pub(crate) async fn run_join(
	mut rx: UnboundedReceiver<(usize, Message)>,
	arity: usize,
	out: SetFn,
) {
	let mut pending: FxHashMap<u64, Vec<Option<Message>>> = FxHashMap::default();
	while let Some((slot, message)) = rx.recv().await {
		let id = message.id;
		let entry = pending.entry(id).or_insert_with(|| vec![None; arity]);
		entry[slot] = Some(message);
		if entry.iter().all(Option::is_some) {
			if let Some(complete) = pending.remove(&id) {
				out(complete.into_iter().flatten().collect());
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use parking_lot::Mutex;
	use strata_model::{DataCellIndex, ProductStore, Products};
	use tokio::sync::mpsc;

	use super::*;
	use crate::message::InputSet;

	fn message(id: u64, source: &str) -> Message {
		let index = DataCellIndex::base().make_child(id, "event");
		Message {
			store: Arc::new(ProductStore::new(index, source, Products::new())),
			id,
		}
	}

	#[tokio::test(flavor = "current_thread")]
	async fn forwards_only_complete_tuples() {
		let (tx, rx) = mpsc::unbounded_channel();
		let seen: Arc<Mutex<Vec<InputSet>>> = Arc::new(Mutex::new(Vec::new()));
		let captured = Arc::clone(&seen);
		let out: SetFn = Arc::new(move |set| captured.lock().push(set));

		tx.send((0, message(1, "a"))).unwrap();
		tx.send((0, message(2, "a"))).unwrap();
		tx.send((1, message(2, "b"))).unwrap();
		tx.send((1, message(1, "b"))).unwrap();
		// Id 3 never completes.
		tx.send((0, message(3, "a"))).unwrap();
		drop(tx);

		run_join(rx, 2, out).await;

		let tuples = seen.lock();
		assert_eq!(tuples.len(), 2);
		let mut ids: Vec<_> = tuples.iter().map(|set| set[0].id).collect();
		ids.sort_unstable();
		assert_eq!(ids, [1, 2]);
		for set in tuples.iter() {
			assert_eq!(set.len(), 2);
			assert_eq!(set[0].id, set[1].id);
			assert_eq!(set[0].store.source().as_str(), "a");
			assert_eq!(set[1].store.source().as_str(), "b");
		}
	}
}
