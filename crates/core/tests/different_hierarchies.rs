//! One graph, two hierarchies: events nested under runs and events sitting
//! directly under the job.

use std::sync::{Arc, Mutex};

use strata_core::{
	Concurrency, DataCellIndex, FrameworkGraph, Handle, LayerGenerator, LayerSpec, ProductQuery,
};

fn provided(layer: &str, suffix: &str) -> ProductQuery {
	ProductQuery::new("input", layer).suffix(suffix)
}

#[test]
fn folds_see_only_their_partition() {
	let mut cells = LayerGenerator::new();
	cells.add_layer("run", LayerSpec::new("job", 2));
	cells.add_layer("event", LayerSpec::new("run", 5));
	cells.add_layer("event", LayerSpec::new("job", 10));

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
	let seen_run = Arc::clone(&run_sums);
	g.observe(
		"verify_run_sum",
		move |sum: Handle<u32>| seen_run.lock().unwrap().push(*sum),
		Concurrency::Unlimited,
	)
	.input_family([ProductQuery::new("run_add", "run").suffix("run_sum")]);

	let job_sums: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
	let seen_job = Arc::clone(&job_sums);
	g.observe(
		"verify_job_sum",
		move |sum: Handle<u32>| seen_job.lock().unwrap().push(*sum),
		Concurrency::Unlimited,
	)
	.input_family([ProductQuery::new("job_add", "job").suffix("job_sum")]);

	g.execute().unwrap();

	// Every event, nested or not, reaches the provider through the single
	// "event" broadcaster.
	assert_eq!(g.execution_count("provide_num"), 20);

	// The nested events sum to 10 per run; the top-level events are not in
	// any run partition and never reach run_add.
	assert_eq!(g.execution_count("run_add"), 10);
	assert_eq!(run_sums.lock().unwrap().as_slice(), &[10, 10]);

	// The job partition spans both hierarchies: 2 * 10 + 45.
	assert_eq!(g.execution_count("job_add"), 20);
	assert_eq!(job_sums.lock().unwrap().as_slice(), &[65]);

	assert_eq!(g.seen_cell_count("/job/run/event", false).unwrap(), 10);
	assert_eq!(g.seen_cell_count("/job/event", false).unwrap(), 10);
}
