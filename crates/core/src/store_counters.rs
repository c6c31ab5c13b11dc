//! Arrival counting for folds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use strata_model::FlushCounts;

use crate::message::MessageId;

/// Arrival bookkeeping for one fold partition key.
///
/// `counts` records how many messages of each layer have been folded in;
/// the flush value records how many to expect. Completion may be observed
/// by at most one caller (the flush-exactly-once exchange).
#[derive(Default)]
pub(crate) struct StoreCounter {
	counts: Mutex<FxHashMap<u64, u64>>,
	flush: Mutex<Option<(Arc<FlushCounts>, MessageId)>>,
	spent: AtomicBool,
}

impl StoreCounter {
	pub fn increment(&self, layer_hash: u64) {
		*self.counts.lock().entry(layer_hash).or_default() += 1;
	}

	pub fn set_flush_value(&self, counts: Arc<FlushCounts>, original_id: MessageId) {
		*self.flush.lock() = Some((counts, original_id));
	}

	/// Necessary for matching the fold result to downstream join nodes.
	pub fn original_id(&self) -> MessageId {
		self.flush.lock().as_ref().map(|(_, id)| *id).unwrap_or(0)
	}

	pub fn is_complete(&self) -> bool {
		if self.spent.load(Ordering::SeqCst) {
			return false;
		}

		let flush = self.flush.lock();
		let Some((expected, _)) = flush.as_ref() else {
			return false;
		};

		let counts = self.counts.lock();
		// The flush value can land before any child has been folded in.
		if counts.is_empty() && !expected.is_empty() {
			return false;
		}
		for (&layer_hash, &seen) in counts.iter() {
			if expected.count_for(layer_hash) != Some(seen) {
				return false;
			}
		}
		drop(counts);
		drop(flush);

		// Flush only once.
		!self.spent.swap(true, Ordering::SeqCst)
	}
}

/// The per-partition counter map shared by a fold's concurrent invocations.
#[derive(Default)]
pub(crate) struct CountStores {
	counters: Mutex<FxHashMap<u64, Arc<StoreCounter>>>,
}

impl CountStores {
	pub fn counter_for(&self, hash: u64) -> Arc<StoreCounter> {
		Arc::clone(self.counters.lock().entry(hash).or_default())
	}

	/// Removes and returns the counter when it is complete; only one caller
	/// ever receives it.
	pub fn done_with(&self, hash: u64) -> Option<Arc<StoreCounter>> {
		let mut counters = self.counters.lock();
		let counter = Arc::clone(counters.get(&hash)?);
		if counter.is_complete() {
			counters.remove(&hash);
			Some(counter)
		} else {
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use super::*;

	fn expected(entries: &[(u64, u64)]) -> Arc<FlushCounts> {
		Arc::new(FlushCounts::from_counts(BTreeMap::from_iter(
			entries.iter().copied(),
		)))
	}

	#[test]
	fn incomplete_until_flush_value_arrives() {
		let stores = CountStores::default();
		let counter = stores.counter_for(1);
		counter.increment(10);
		assert!(stores.done_with(1).is_none());

		counter.set_flush_value(expected(&[(10, 1)]), 7);
		let done = stores.done_with(1).expect("complete after flush");
		assert_eq!(done.original_id(), 7);
	}

	#[test]
	fn flush_value_before_any_arrival_is_not_complete() {
		let counter = StoreCounter::default();
		counter.set_flush_value(expected(&[(10, 2)]), 0);
		assert!(!counter.is_complete());

		counter.increment(10);
		assert!(!counter.is_complete());
		counter.increment(10);
		assert!(counter.is_complete());
	}

	#[test]
	fn completion_is_observed_once() {
		let counter = StoreCounter::default();
		counter.increment(10);
		counter.set_flush_value(expected(&[(10, 1)]), 0);
		assert!(counter.is_complete());
		assert!(!counter.is_complete());
	}

	#[test]
	fn extra_layers_in_flush_value_are_allowed() {
		// A coarse scope reports counts for every descendant layer; the fold
		// only ever sees the layers its inputs arrive at.
		let counter = StoreCounter::default();
		counter.increment(10);
		counter.set_flush_value(expected(&[(10, 1), (20, 5)]), 0);
		assert!(counter.is_complete());
	}

	#[test]
	fn mismatched_count_is_not_complete() {
		let counter = StoreCounter::default();
		counter.increment(10);
		counter.increment(10);
		counter.set_flush_value(expected(&[(10, 3)]), 0);
		assert!(!counter.is_complete());
	}
}
