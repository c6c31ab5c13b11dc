//! Per-scope child counting.
//!
//! The router keeps one counter per live scope. When a scope closes, its
//! accumulated per-layer counts are folded into the parent scope's counter
//! (plus one for the closed scope's own layer) and handed to folds as
//! [`FlushCounts`], the expected-arrival table a fold compares against what
//! it has actually seen.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::index::DataCellIndex;

/// Per-layer-hash child counts reported when a scope closes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushCounts {
	child_counts: BTreeMap<u64, u64>,
}

impl FlushCounts {
	pub fn from_counts(child_counts: BTreeMap<u64, u64>) -> Self {
		Self { child_counts }
	}

	pub fn count_for(&self, layer_hash: u64) -> Option<u64> {
		self.child_counts.get(&layer_hash).copied()
	}

	pub fn is_empty(&self) -> bool {
		self.child_counts.is_empty()
	}

	pub fn len(&self) -> usize {
		self.child_counts.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
		self.child_counts.iter().map(|(&h, &c)| (h, c))
	}
}

struct CounterEntry {
	parent_hash: Option<u64>,
	layer_hash: u64,
	child_counts: BTreeMap<u64, u64>,
}

/// The scope-nested counter tree owned by the index router.
#[derive(Default)]
pub struct FlushCounters {
	counters: FxHashMap<u64, CounterEntry>,
}

impl FlushCounters {
	/// Registers a counter for `index` if none exists yet.
	pub fn update(&mut self, index: &DataCellIndex) {
		self.counters
			.entry(index.hash())
			.or_insert_with(|| CounterEntry {
				parent_hash: index.parent().map(|p| p.hash()),
				layer_hash: index.layer_hash(),
				child_counts: BTreeMap::new(),
			});
	}

	/// Removes the counter for `index`, folding its counts into the parent.
	///
	/// The parent's counter gains every descendant count plus one entry for
	/// the extracted index's own layer, so a coarse scope that closes later
	/// reports totals over its entire subtree.
	pub fn extract(&mut self, index: &DataCellIndex) -> FlushCounts {
		let Some(entry) = self.counters.remove(&index.hash()) else {
			return FlushCounts::default();
		};

		if let Some(parent) = entry
			.parent_hash
			.and_then(|hash| self.counters.get_mut(&hash))
		{
			for (&layer_hash, &count) in &entry.child_counts {
				*parent.child_counts.entry(layer_hash).or_default() += count;
			}
			*parent.child_counts.entry(entry.layer_hash).or_default() += 1;
		}

		FlushCounts::from_counts(entry.child_counts)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::index::DataCellIndex;

	#[test]
	fn counts_aggregate_up_the_scope_tree() {
		let base = DataCellIndex::base();
		let run0 = base.make_child(0, "run");
		let run1 = base.make_child(1, "run");
		let events: Vec<_> = (0..3).map(|i| run0.make_child(i, "event")).collect();

		let mut counters = FlushCounters::default();
		counters.update(base);
		counters.update(&run0);
		for event in &events {
			counters.update(event);
			// Leaf scopes close without children of their own.
			assert!(counters.extract(event).is_empty());
		}

		let run_counts = counters.extract(&run0);
		assert_eq!(run_counts.count_for(events[0].layer_hash()), Some(3));

		counters.update(&run1);
		assert!(counters.extract(&run1).is_empty());

		let job_counts = counters.extract(base);
		assert_eq!(job_counts.count_for(run0.layer_hash()), Some(2));
		assert_eq!(job_counts.count_for(events[0].layer_hash()), Some(3));
	}

	#[test]
	fn extract_without_update_is_empty() {
		let mut counters = FlushCounters::default();
		assert!(counters
			.extract(&DataCellIndex::base().make_child(0, "run"))
			.is_empty());
	}
}
