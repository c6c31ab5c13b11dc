//! Predicate gating: consumers fire only when every declared predicate
//! accepts the message id.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use strata_core::{
	Concurrency, DataCellIndex, FrameworkGraph, Handle, LayerGenerator, LayerSpec, ProductQuery,
};

fn provided(suffix: &str) -> ProductQuery {
	ProductQuery::new("input", "event").suffix(suffix)
}

fn ten_events() -> LayerGenerator {
	let mut cells = LayerGenerator::new();
	cells.add_layer("event", LayerSpec::new("job", 10));
	cells
}

fn provide_numbers(g: &mut FrameworkGraph) {
	g.provide(
		"provide_num",
		|index: &DataCellIndex| index.number() as u32,
		Concurrency::Unlimited,
	)
	.output_product(provided("num"));
}

#[test]
fn evens_only_gate_halves_the_stream() {
	let cells = ten_events();
	let mut g = FrameworkGraph::new(cells.driver());
	provide_numbers(&mut g);

	g.predicate(
		"evens_only",
		|num: Handle<u32>| *num % 2 == 0,
		Concurrency::Unlimited,
	)
	.input_family([provided("num")]);

	let sum = Arc::new(AtomicU32::new(0));
	let observed = Arc::clone(&sum);
	g.observe(
		"add",
		move |num: Handle<u32>| {
			observed.fetch_add(*num, Ordering::Relaxed);
		},
		Concurrency::Unlimited,
	)
	.input_family([provided("num")])
	.when(&["evens_only"]);

	g.execute().unwrap();

	assert_eq!(g.execution_count("evens_only"), 10);
	assert_eq!(g.execution_count("add"), 5);
	assert_eq!(sum.load(Ordering::Relaxed), 20);
}

#[test]
fn two_predicates_in_parallel_never_both_accept() {
	let cells = ten_events();
	let mut g = FrameworkGraph::new(cells.driver());
	provide_numbers(&mut g);

	g.predicate(
		"evens_only",
		|num: Handle<u32>| *num % 2 == 0,
		Concurrency::Unlimited,
	)
	.input_family([provided("num")]);
	g.predicate(
		"odds_only",
		|num: Handle<u32>| *num % 2 == 1,
		Concurrency::Unlimited,
	)
	.input_family([provided("num")]);

	g.observe("add", |_num: Handle<u32>| {}, Concurrency::Unlimited)
		.input_family([provided("num")])
		.when(&["evens_only", "odds_only"]);

	g.execute().unwrap();

	assert_eq!(g.execution_count("add"), 0);
}

#[test]
fn predicates_gate_other_predicates() {
	let cells = ten_events();
	let mut g = FrameworkGraph::new(cells.driver());
	provide_numbers(&mut g);

	g.predicate(
		"evens_only",
		|num: Handle<u32>| *num % 2 == 0,
		Concurrency::Unlimited,
	)
	.input_family([provided("num")]);

	// Only sees the evens, and rejects them all.
	g.predicate(
		"odds_only",
		|num: Handle<u32>| *num % 2 == 1,
		Concurrency::Unlimited,
	)
	.input_family([provided("num")])
	.when(&["evens_only"]);

	g.observe("add", |_num: Handle<u32>| {}, Concurrency::Unlimited)
		.input_family([provided("num")])
		.when(&["odds_only"]);

	g.execute().unwrap();

	assert_eq!(g.execution_count("odds_only"), 5);
	assert_eq!(g.execution_count("add"), 0);
}

#[test]
fn gated_consumers_may_take_several_inputs() {
	let cells = ten_events();
	let mut g = FrameworkGraph::new(cells.driver());
	provide_numbers(&mut g);
	g.provide(
		"provide_other",
		|index: &DataCellIndex| 100 + index.number() as u32,
		Concurrency::Unlimited,
	)
	.output_product(provided("other_num"));

	g.predicate(
		"evens_only",
		|num: Handle<u32>| *num % 2 == 0,
		Concurrency::Unlimited,
	)
	.input_family([provided("num")]);

	let sum = Arc::new(AtomicU32::new(0));
	let observed = Arc::clone(&sum);
	g.observe(
		"add_difference",
		move |num: Handle<u32>, other: Handle<u32>| {
			observed.fetch_add(*other - *num, Ordering::Relaxed);
		},
		Concurrency::Unlimited,
	)
	.input_family([provided("num"), provided("other_num")])
	.when(&["evens_only"]);

	g.execute().unwrap();

	assert_eq!(g.execution_count("add_difference"), 5);
	assert_eq!(sum.load(Ordering::Relaxed), 500);
}
