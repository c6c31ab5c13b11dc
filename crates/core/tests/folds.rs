//! Folds aggregate per partition scope and emit exactly once per scope.

use std::sync::{Arc, Mutex};

use strata_core::{
	Concurrency, DataCellIndex, FrameworkGraph, Handle, LayerGenerator, LayerSpec, ProductQuery,
};

fn provided(layer: &str, suffix: &str) -> ProductQuery {
	ProductQuery::new("input", layer).suffix(suffix)
}

#[test]
fn sums_per_run_and_per_job() {
	let mut cells = LayerGenerator::new();
	cells.add_layer("run", LayerSpec::new("job", 2));
	cells.add_layer("event", LayerSpec::new("run", 5));

	let mut g = FrameworkGraph::new(cells.driver());
	g.provide(
		"provide_num",
		|index: &DataCellIndex| index.number() as u32,
		Concurrency::Unlimited,
	)
	.output_product(provided("event", "num"));

	g.fold(
		"run_add",
		|sum: &mut u32, num: Handle<u32>| *sum += *num,
		Concurrency::Unlimited,
		"run",
		0u32,
	)
	.input_family([provided("event", "num")])
	.output_products(&["run_sum"]);

	g.fold(
		"job_add",
		|sum: &mut u32, num: Handle<u32>| *sum += *num,
		Concurrency::Unlimited,
		"job",
		0u32,
	)
	.input_family([provided("event", "num")])
	.output_products(&["job_sum"]);

	let run_sums: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
	let seen_run_sums = Arc::clone(&run_sums);
	g.observe(
		"verify_run_sum",
		move |sum: Handle<u32>| seen_run_sums.lock().unwrap().push(*sum),
		Concurrency::Unlimited,
	)
	.input_family([ProductQuery::new("run_add", "run").suffix("run_sum")]);

	let job_sums: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
	let seen_job_sums = Arc::clone(&job_sums);
	g.observe(
		"verify_job_sum",
		move |sum: Handle<u32>| seen_job_sums.lock().unwrap().push(*sum),
		Concurrency::Unlimited,
	)
	.input_family([ProductQuery::new("job_add", "job").suffix("job_sum")]);

	g.execute().unwrap();

	assert_eq!(g.execution_count("run_add"), 10);
	assert_eq!(g.execution_count("job_add"), 10);
	assert_eq!(g.execution_count("verify_run_sum"), 2);
	assert_eq!(g.execution_count("verify_job_sum"), 1);

	assert_eq!(run_sums.lock().unwrap().as_slice(), &[10, 10]);
	assert_eq!(job_sums.lock().unwrap().as_slice(), &[20]);
}

#[test]
fn fold_results_carry_the_partition_index() {
	let mut cells = LayerGenerator::new();
	cells.add_layer("run", LayerSpec::new("job", 3));
	cells.add_layer("event", LayerSpec::new("run", 4));

	let mut g = FrameworkGraph::new(cells.driver());
	g.provide(
		"provide_num",
		|_index: &DataCellIndex| 1u64,
		Concurrency::Unlimited,
	)
	.output_product(provided("event", "num"));

	g.fold(
		"count_events",
		|count: &mut u64, _num: Handle<u64>| *count += 1,
		Concurrency::Unlimited,
		"run",
		0u64,
	)
	.input_family([provided("event", "num")])
	.output_products(&["event_count"]);

	let origins: Arc<Mutex<Vec<(String, u64)>>> = Arc::new(Mutex::new(Vec::new()));
	let seen = Arc::clone(&origins);
	g.observe(
		"verify_origin",
		move |count: Handle<u64>| {
			seen.lock()
				.unwrap()
				.push((count.index().layer_name().as_str().to_owned(), *count));
		},
		Concurrency::Unlimited,
	)
	.input_family([ProductQuery::new("count_events", "run").suffix("event_count")]);

	g.execute().unwrap();

	let origins = origins.lock().unwrap();
	assert_eq!(origins.len(), 3);
	for (layer, count) in origins.iter() {
		assert_eq!(layer, "run");
		assert_eq!(*count, 4);
	}
}
