//! Per-node concurrency policies bound what actually runs at once, not
//! just what the configuration says.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use strata_core::{
	Concurrency, DataCellIndex, FrameworkGraph, Handle, LayerGenerator, LayerSpec, ProductQuery,
	RunConfig,
};

/// High-water mark of concurrently running invocations.
#[derive(Default)]
struct InFlight {
	current: AtomicUsize,
	peak: AtomicUsize,
}

impl InFlight {
	fn enter(&self) {
		let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
		self.peak.fetch_max(now, Ordering::SeqCst);
	}

	fn exit(&self) {
		self.current.fetch_sub(1, Ordering::SeqCst);
	}

	fn peak(&self) -> usize {
		self.peak.load(Ordering::SeqCst)
	}
}

fn provided(suffix: &str) -> ProductQuery {
	ProductQuery::new("input", "event").suffix(suffix)
}

fn forty_events() -> LayerGenerator {
	let mut cells = LayerGenerator::new();
	cells.add_layer("event", LayerSpec::new("job", 40));
	cells
}

#[test]
fn limited_nodes_never_exceed_their_cap() {
	const CAP: usize = 2;

	let cells = forty_events();
	// More worker threads than the cap, so only the semaphore can be the
	// thing holding invocations back.
	let mut g = FrameworkGraph::with_config(cells.driver(), RunConfig::with_max_parallelism(4));
	g.provide(
		"provide_num",
		|index: &DataCellIndex| index.number(),
		Concurrency::Unlimited,
	)
	.output_product(provided("num"));

	let in_flight = Arc::new(InFlight::default());
	let watched = Arc::clone(&in_flight);
	g.observe(
		"slow_observer",
		move |_num: Handle<u64>| {
			watched.enter();
			thread::sleep(Duration::from_millis(2));
			watched.exit();
		},
		Concurrency::Limited(CAP),
	)
	.input_family([provided("num")]);

	g.execute().unwrap();

	assert_eq!(g.execution_count("slow_observer"), 40);
	assert!(
		in_flight.peak() <= CAP,
		"{} invocations in flight under a cap of {CAP}",
		in_flight.peak()
	);
	assert_eq!(in_flight.current.load(Ordering::SeqCst), 0);
}

#[test]
fn serial_config_override_caps_an_unlimited_node() {
	let config = RunConfig::from_toml_str(
		r#"
		max_parallelism = 4

		[concurrency]
		slow_observer = "serial"
		"#,
	)
	.unwrap();

	let cells = forty_events();
	let mut g = FrameworkGraph::with_config(cells.driver(), config);
	g.provide(
		"provide_num",
		|index: &DataCellIndex| index.number(),
		Concurrency::Unlimited,
	)
	.output_product(provided("num"));

	let in_flight = Arc::new(InFlight::default());
	let watched = Arc::clone(&in_flight);
	// Registered unlimited; the configuration wins.
	g.observe(
		"slow_observer",
		move |_num: Handle<u64>| {
			watched.enter();
			thread::sleep(Duration::from_millis(1));
			watched.exit();
		},
		Concurrency::Unlimited,
	)
	.input_family([provided("num")]);

	g.execute().unwrap();

	assert_eq!(g.execution_count("slow_observer"), 40);
	assert_eq!(in_flight.peak(), 1);
}
