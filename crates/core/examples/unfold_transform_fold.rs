//! A small waveform pipeline: unfold each spill into chunks, clamp the
//! samples, and refold the clamped sums per spill.
//!
//! Run with `cargo run --example unfold_transform_fold`; set
//! `RUST_LOG=strata_core=trace` to watch the router work.

use std::sync::{Arc, Mutex};

use strata_core::{
	Concurrency, DataCellIndex, FrameworkGraph, Handle, LayerGenerator, LayerSpec, ProductQuery,
	UnfoldObject,
};

const SPILLS: u64 = 20;
const WIRES_PER_SPILL: u64 = 5120;
const CHUNK_SIZE: u64 = 256;
const CLAMP: i16 = 100;

/// Input description for one spill's waveform generation.
#[derive(Clone)]
struct WaveformSpec {
	wire_count: u64,
	spill: u64,
}

/// A chunk of generated waveforms.
#[derive(Clone)]
struct Waveforms {
	samples: Vec<i16>,
}

struct WaveformGenerator {
	spec: WaveformSpec,
}

impl UnfoldObject for WaveformGenerator {
	type Value = u64;

	fn initial_value(&self) -> u64 {
		0
	}
}

impl WaveformGenerator {
	fn chunk(&self, offset: u64) -> Waveforms {
		let count = CHUNK_SIZE.min(self.spec.wire_count - offset);
		let samples = (0..count)
			.map(|wire| (((self.spec.spill + offset + wire) % 400) as i16) - 200)
			.collect();
		Waveforms { samples }
	}
}

fn clamp_waveforms(waves: &Waveforms) -> Waveforms {
	Waveforms {
		samples: waves
			.samples
			.iter()
			.map(|s| (*s).clamp(-CLAMP, CLAMP))
			.collect(),
	}
}

fn main() {
	tracing_subscriber::fmt::init();

	let mut cells = LayerGenerator::new();
	cells.add_layer("run", LayerSpec::new("job", 1));
	cells.add_layer("spill", LayerSpec::new("run", SPILLS));

	let mut g = FrameworkGraph::new(cells.driver());

	g.provide(
		"provide_wgen",
		|index: &DataCellIndex| WaveformSpec {
			wire_count: WIRES_PER_SPILL,
			spill: index.number(),
		},
		Concurrency::Unlimited,
	)
	.output_product(ProductQuery::new("input", "spill").suffix("wgen"));

	g.unfold(
		"waveform_generator",
		|spec: Handle<WaveformSpec>| WaveformGenerator {
			spec: (*spec).clone(),
		},
		|generator: &WaveformGenerator, offset: &u64| *offset < generator.spec.wire_count,
		|generator: &WaveformGenerator, offset: u64| {
			(offset + CHUNK_SIZE, generator.chunk(offset))
		},
		Concurrency::Unlimited,
		"chunk",
	)
	.input_family([ProductQuery::new("input", "spill").suffix("wgen")])
	.output_products(&["waves"]);

	g.transform(
		"clamp",
		|waves: Handle<Waveforms>| clamp_waveforms(&waves),
		Concurrency::Unlimited,
	)
	.input_family([ProductQuery::new("waveform_generator", "chunk").suffix("waves")])
	.output_products(&["clamped_waves"]);

	g.fold(
		"accumulate_for_spill",
		|sum: &mut i64, waves: Handle<Waveforms>| {
			*sum += waves.samples.iter().map(|s| i64::from(*s)).sum::<i64>();
		},
		Concurrency::Unlimited,
		"spill",
		0i64,
	)
	.input_family([ProductQuery::new("clamp", "chunk").suffix("clamped_waves")])
	.output_products(&["summed_waves"]);

	let sums: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
	let collected = Arc::clone(&sums);
	g.observe(
		"report",
		move |sum: Handle<i64>| collected.lock().unwrap().push(*sum),
		Concurrency::Unlimited,
	)
	.input_family([ProductQuery::new("accumulate_for_spill", "spill").suffix("summed_waves")]);

	g.execute().expect("pipeline failed");

	let sums = sums.lock().unwrap();
	println!(
		"clamped {} spills, {} chunks, per-spill sums: {:?}",
		sums.len(),
		g.execution_count("clamp"),
		&*sums
	);
}
