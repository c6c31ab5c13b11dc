//! Wiring a persistence handle into a framework graph.

use std::sync::Arc;

use strata_core::{Concurrency, FrameworkGraph};
use strata_model::{ProductStore, TypeTag};
use tracing::error;

use crate::error::Result;
use crate::persistence::Persistence;

/// Registers an output node that mirrors every published store into
/// `sink`, committing once per store under its cell index.
///
/// Containers are declared lazily from each store's product set, so the
/// sink sees exactly what the graph publishes. Persistence failures are
/// reported and the run continues; the data products in memory stay
/// authoritative.
pub fn attach_output(graph: &mut FrameworkGraph, name: &str, sink: Arc<dyn Persistence>) {
	graph.output(
		name,
		move |store: &ProductStore| {
			if store.products().is_empty() {
				return;
			}
			if let Err(err) = write_store(sink.as_ref(), store) {
				error!(%err, source = %store.source(), "failed to persist store");
			}
		},
		Concurrency::Serial,
	);
}

fn write_store(sink: &dyn Persistence, store: &ProductStore) -> Result<()> {
	let creator = store.source().as_str();
	let declared: Vec<(String, TypeTag)> = store
		.products()
		.iter()
		.map(|(label, entry)| (label.as_str().to_owned(), entry.tag()))
		.collect();
	sink.create_containers(creator, &declared)?;

	for (label, entry) in store.products().iter() {
		sink.register_write(
			creator,
			label.as_str(),
			Arc::clone(entry.value()),
			entry.tag(),
		)?;
	}
	sink.commit(creator, &store.index().to_string())
}
