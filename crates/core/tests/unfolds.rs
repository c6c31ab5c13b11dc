//! Unfolds expand a parent cell into children; folds over the child layer
//! refold them using the unfold's own flush messages.

use std::sync::{Arc, Mutex};

use strata_core::{
	Concurrency, DataCellIndex, FrameworkGraph, Handle, LayerGenerator, LayerSpec, ProductQuery,
	UnfoldObject,
};

struct Iota {
	max: u64,
}

impl UnfoldObject for Iota {
	type Value = u64;

	fn initial_value(&self) -> u64 {
		0
	}
}

fn provided(layer: &str, suffix: &str) -> ProductQuery {
	ProductQuery::new("input", layer).suffix(suffix)
}

#[test]
fn unfold_then_refold_sums_each_parent() {
	let mut cells = LayerGenerator::new();
	cells.add_layer("event", LayerSpec::new("job", 2));

	let mut g = FrameworkGraph::new(cells.driver());
	g.provide(
		"provide_max",
		|index: &DataCellIndex| 10 * (index.number() + 1),
		Concurrency::Unlimited,
	)
	.output_product(provided("event", "max_number"));

	g.unfold(
		"iota",
		|max: Handle<u64>| Iota { max: *max },
		|iota: &Iota, value: &u64| *value < iota.max,
		|_iota: &Iota, value: u64| (value + 1, value),
		Concurrency::Unlimited,
		"lower1",
	)
	.input_family([provided("event", "max_number")])
	.output_products(&["value"]);

	g.fold(
		"sum_values",
		|sum: &mut u64, value: Handle<u64>| *sum += *value,
		Concurrency::Unlimited,
		"event",
		0u64,
	)
	.input_family([ProductQuery::new("iota", "lower1").suffix("value")])
	.output_products(&["event_sum"]);

	let sums: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
	let seen = Arc::clone(&sums);
	g.observe(
		"verify_event_sum",
		move |sum: Handle<u64>| seen.lock().unwrap().push(*sum),
		Concurrency::Unlimited,
	)
	.input_family([ProductQuery::new("sum_values", "event").suffix("event_sum")]);

	g.execute().unwrap();

	assert_eq!(g.execution_count("iota"), 2);
	// 10 children for event 0, 20 for event 1.
	assert_eq!(g.execution_count("sum_values"), 30);
	assert_eq!(g.execution_count("verify_event_sum"), 2);

	let mut sums = sums.lock().unwrap().clone();
	sums.sort_unstable();
	assert_eq!(sums, [45, 190]);

	assert_eq!(g.seen_cell_count("/job/event/lower1", false).unwrap(), 30);
}

#[test]
fn an_unfold_with_no_children_flushes_nothing() {
	let mut cells = LayerGenerator::new();
	cells.add_layer("event", LayerSpec::new("job", 2));

	let mut g = FrameworkGraph::new(cells.driver());
	// Event 0 generates no children at all; event 1 generates ten.
	g.provide(
		"provide_max",
		|index: &DataCellIndex| 10 * index.number(),
		Concurrency::Unlimited,
	)
	.output_product(provided("event", "max_number"));

	g.unfold(
		"iota",
		|max: Handle<u64>| Iota { max: *max },
		|iota: &Iota, value: &u64| *value < iota.max,
		|_iota: &Iota, value: u64| (value + 1, value),
		Concurrency::Unlimited,
		"lower1",
	)
	.input_family([provided("event", "max_number")])
	.output_products(&["value"]);

	g.fold(
		"sum_values",
		|sum: &mut u64, value: Handle<u64>| *sum += *value,
		Concurrency::Unlimited,
		"event",
		0u64,
	)
	.input_family([ProductQuery::new("iota", "lower1").suffix("value")])
	.output_products(&["event_sum"]);

	let sums: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
	let seen = Arc::clone(&sums);
	g.observe(
		"verify_event_sum",
		move |sum: Handle<u64>| seen.lock().unwrap().push(*sum),
		Concurrency::Unlimited,
	)
	.input_family([ProductQuery::new("sum_values", "event").suffix("event_sum")]);

	g.execute().unwrap();

	assert_eq!(g.execution_count("iota"), 2);
	assert_eq!(g.execution_count("sum_values"), 10);
	// Only the event with children produces a refolded sum.
	assert_eq!(sums.lock().unwrap().as_slice(), &[45]);
	assert_eq!(g.seen_cell_count("/job/event/lower1", false).unwrap(), 10);
}
