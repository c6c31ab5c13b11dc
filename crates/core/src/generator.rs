//! Declarative hierarchy drivers for tests and demos.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use strata_model::{DataCellIndex, IndexRef};

use crate::driver::Driver;

/// One layer of a generated hierarchy.
#[derive(Clone, Debug)]
pub struct LayerSpec {
	pub parent: String,
	pub count: u64,
	pub stride: u64,
}

impl LayerSpec {
	pub fn new(parent: &str, count: u64) -> Self {
		Self {
			parent: parent.to_owned(),
			count,
			stride: 1,
		}
	}

	pub fn with_stride(mut self, stride: u64) -> Self {
		self.stride = stride.max(1);
		self
	}
}

/// Builds depth-first index streams from declared layers.
///
/// ```
/// use strata_core::{FrameworkGraph, LayerGenerator, LayerSpec};
///
/// let mut cells = LayerGenerator::new();
/// cells.add_layer("run", LayerSpec::new("job", 2));
/// cells.add_layer("event", LayerSpec::new("run", 5));
/// let _graph = FrameworkGraph::new(cells.driver());
/// ```
///
/// The generator keeps counting what its drivers emit, so tests can compare
/// `emitted_cell_count` against the graph's `seen_cell_count` after a run.
#[derive(Default)]
pub struct LayerGenerator {
	layers: Vec<(String, LayerSpec)>,
	emitted: Arc<Mutex<FxHashMap<String, u64>>>,
}

impl LayerGenerator {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_layer(&mut self, name: &str, spec: LayerSpec) {
		self.layers.push((name.to_owned(), spec));
	}

	/// A driver yielding the declared hierarchy depth-first, base first.
	pub fn driver(&self) -> impl Driver {
		let mut sequence = Vec::new();
		self.visit(DataCellIndex::base(), &mut sequence);
		let emitted = Arc::clone(&self.emitted);
		let mut iter = sequence.into_iter();
		move || {
			let next: Option<IndexRef> = iter.next();
			if let Some(index) = &next {
				*emitted.lock().entry(index.layer_path()).or_default() += 1;
			}
			anyhow::Ok(next)
		}
	}

	/// How many cells drivers from this generator emitted at `layer_path`.
	pub fn emitted_cell_count(&self, layer_path: &str) -> u64 {
		self.emitted.lock().get(layer_path).copied().unwrap_or(0)
	}

	fn visit(&self, index: &IndexRef, sequence: &mut Vec<IndexRef>) {
		sequence.push(Arc::clone(index));
		for (name, spec) in &self.layers {
			if *index.layer_name() == *spec.parent.as_str() {
				for i in 0..spec.count {
					let child = index.make_child(i * spec.stride, name.as_str());
					self.visit(&child, sequence);
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn emits_depth_first_with_base_first() {
		let mut cells = LayerGenerator::new();
		cells.add_layer("run", LayerSpec::new("job", 2));
		cells.add_layer("event", LayerSpec::new("run", 3));

		let mut driver = cells.driver();
		let mut paths = Vec::new();
		while let Ok(Some(index)) = driver.next() {
			paths.push(index.to_string());
		}

		assert_eq!(paths.len(), 1 + 2 + 6);
		assert_eq!(paths[0], "[]");
		assert_eq!(paths[1], "[run:0]");
		assert_eq!(paths[2], "[run:0, event:0]");
		assert_eq!(paths[5], "[run:1]");

		assert_eq!(cells.emitted_cell_count("/job"), 1);
		assert_eq!(cells.emitted_cell_count("/job/run"), 2);
		assert_eq!(cells.emitted_cell_count("/job/run/event"), 6);
	}

	#[test]
	fn stride_spaces_the_numbers() {
		let mut cells = LayerGenerator::new();
		cells.add_layer("spill", LayerSpec::new("job", 3).with_stride(10));

		let mut driver = cells.driver();
		let mut numbers = Vec::new();
		while let Ok(Some(index)) = driver.next() {
			if index.has_parent() {
				numbers.push(index.number());
			}
		}
		assert_eq!(numbers, [0, 10, 20]);
	}

	#[test]
	fn mixed_hierarchies_share_the_base() {
		let mut cells = LayerGenerator::new();
		cells.add_layer("run", LayerSpec::new("job", 2));
		cells.add_layer("event", LayerSpec::new("run", 5));
		cells.add_layer("event", LayerSpec::new("job", 10));

		let mut driver = cells.driver();
		let mut total = 0;
		while let Ok(Some(_)) = driver.next() {
			total += 1;
		}
		assert_eq!(total, 1 + 2 + 10 + 10);
		assert_eq!(cells.emitted_cell_count("/job/run/event"), 10);
		assert_eq!(cells.emitted_cell_count("/job/event"), 10);
	}
}
