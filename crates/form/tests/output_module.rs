//! End to end: a graph's published stores land in persistence and read
//! back under their cell index.

use strata_core::{
	Concurrency, DataCellIndex, FrameworkGraph, Handle, LayerGenerator, LayerSpec, ProductQuery,
};
use strata_form::{Technology, attach_output, create_persistence};
use strata_model::TypeTag;

#[test]
fn published_stores_are_persisted_per_cell() {
	let mut cells = LayerGenerator::new();
	cells.add_layer("event", LayerSpec::new("job", 3));

	let sink = create_persistence(Technology::Memory, "events.mem");

	let mut g = FrameworkGraph::new(cells.driver());
	g.provide(
		"provide_num",
		|index: &DataCellIndex| index.number() as u32,
		Concurrency::Unlimited,
	)
	.output_product(ProductQuery::new("input", "event").suffix("num"));
	g.transform("double", |num: Handle<u32>| 2 * *num, Concurrency::Unlimited)
		.input_family([ProductQuery::new("input", "event").suffix("num")])
		.output_products(&["doubled"]);
	attach_output(&mut g, "write_events", sink.clone());

	g.execute().unwrap();

	// One store per node per event reached the sink.
	assert_eq!(g.execution_count("write_events"), 6);

	for event in 0..3u32 {
		let id = format!("[event:{event}]");
		let doubled = sink
			.read("double", "doubled", &id, TypeTag::of::<u32>())
			.unwrap();
		assert_eq!(*doubled.downcast::<u32>().unwrap(), 2 * event);

		let provided = sink
			.read("provide_num", "num", &id, TypeTag::of::<u32>())
			.unwrap();
		assert_eq!(*provided.downcast::<u32>().unwrap(), event);
	}
}
