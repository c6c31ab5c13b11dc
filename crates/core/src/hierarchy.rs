//! Which data layers the framework has seen, and how often.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use strata_model::DataCellIndex;

use crate::error::Error;

struct LayerRecord {
	path: String,
	count: u64,
}

/// Counts distinct cells per layer path.
///
/// Fed by the pump for every routed index and by unfolds for every child
/// index they announce; queried after the run through
/// [`seen_cell_count`](crate::graph::FrameworkGraph::seen_cell_count).
#[derive(Default)]
pub(crate) struct DataLayerHierarchy {
	counts: Mutex<FxHashMap<u64, LayerRecord>>,
}

impl DataLayerHierarchy {
	pub fn increment(&self, index: &DataCellIndex) {
		let mut counts = self.counts.lock();
		counts
			.entry(index.layer_hash())
			.or_insert_with(|| LayerRecord {
				path: index.layer_path(),
				count: 0,
			})
			.count += 1;
	}

	pub fn count_for(&self, layer_path: &str, missing_ok: bool) -> Result<u64, Error> {
		let counts = self.counts.lock();
		match counts.values().find(|record| record.path == layer_path) {
			Some(record) => Ok(record.count),
			None if missing_ok => Ok(0),
			None => Err(Error::Misconfiguration(format!(
				"no data layer '{layer_path}' was seen during the run"
			))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn counts_by_layer_path() {
		let hierarchy = DataLayerHierarchy::default();
		let base = DataCellIndex::base();
		hierarchy.increment(base);
		for i in 0..3 {
			hierarchy.increment(&base.make_child(i, "run"));
		}

		assert_eq!(hierarchy.count_for("/job", false).unwrap(), 1);
		assert_eq!(hierarchy.count_for("/job/run", false).unwrap(), 3);
		assert_eq!(hierarchy.count_for("/job/spill", true).unwrap(), 0);
		assert!(hierarchy.count_for("/job/spill", false).is_err());
	}
}
