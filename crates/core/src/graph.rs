//! The framework graph: registration surface, driver loop, and shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rustc_hash::FxHashMap;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::catalog::NodeCatalog;
use crate::config::RunConfig;
use crate::driver::Driver;
use crate::edges;
use crate::error::Error;
use crate::hierarchy::DataLayerHierarchy;
use crate::node::RunState;
use crate::router::IndexRouter;

/// A dataflow graph under construction, and the handle that executes it.
///
/// Nodes are declared through the registration methods (see
/// [`provide`](FrameworkGraph::provide) and friends), wired at finalize,
/// and run by [`execute`](FrameworkGraph::execute), which pulls the driver
/// dry, drains the scope stack, waits for quiescence, and returns the
/// first error if any node failed.
pub struct FrameworkGraph {
	driver: Option<Box<dyn Driver>>,
	config: RunConfig,
	catalog: NodeCatalog,
	registration_errors: Vec<String>,
	counters: FxHashMap<String, Arc<AtomicUsize>>,
	hierarchy: Arc<DataLayerHierarchy>,
}

impl FrameworkGraph {
	pub fn new(driver: impl Driver) -> Self {
		Self::with_config(driver, RunConfig::default())
	}

	pub fn with_config(driver: impl Driver, config: RunConfig) -> Self {
		Self {
			driver: Some(Box::new(driver)),
			config,
			catalog: NodeCatalog::default(),
			registration_errors: Vec::new(),
			counters: FxHashMap::default(),
			hierarchy: Arc::new(DataLayerHierarchy::default()),
		}
	}

	pub(crate) fn catalog_mut(&mut self) -> &mut NodeCatalog {
		&mut self.catalog
	}

	pub(crate) fn report(&mut self, problem: String) {
		self.registration_errors.push(problem);
	}

	/// Reserves a node name, reporting duplicates, and returns its
	/// execution counter.
	pub(crate) fn register_node_name(&mut self, name: &str) -> Arc<AtomicUsize> {
		if let Some(existing) = self.counters.get(name) {
			self.registration_errors
				.push(format!("duplicate node name '{name}'"));
			return Arc::clone(existing);
		}
		let counter = Arc::new(AtomicUsize::new(0));
		self.counters.insert(name.to_owned(), Arc::clone(&counter));
		counter
	}

	/// Finalizes the graph and runs it to completion.
	pub fn execute(&mut self) -> Result<(), Error> {
		let driver = self.driver.take().ok_or_else(|| {
			Error::Invariant(String::from("execute called twice on one graph"))
		})?;
		self.config.validate()?;

		let state = RunState::new();
		let catalog = std::mem::take(&mut self.catalog);
		let errors = std::mem::take(&mut self.registration_errors);
		let plan = edges::finalize(
			catalog,
			errors,
			&self.config,
			Arc::clone(&self.hierarchy),
			state.clone(),
		)?;

		let runtime = tokio::runtime::Builder::new_multi_thread()
			.worker_threads(self.config.max_parallelism)
			.build()
			.map_err(|e| Error::Invariant(format!("cannot build worker pool: {e}")))?;
		info!(
			worker_threads = self.config.max_parallelism,
			"executing graph"
		);

		let hierarchy = Arc::clone(&self.hierarchy);
		let run_state = state.clone();
		runtime.block_on(async move {
			let mut tasks: JoinSet<()> = JoinSet::new();
			for actor in plan.actors {
				tasks.spawn(actor);
			}
			let pump_state = run_state.clone();
			tasks.spawn(pump(driver, plan.router, pump_state, hierarchy));

			while let Some(result) = tasks.join_next().await {
				if let Err(join_error) = result {
					run_state.fail(Error::Invariant(format!(
						"graph task failed: {join_error}"
					)));
				}
			}
		});

		match state.take_error() {
			Some(error) => Err(error),
			None => Ok(()),
		}
	}

	/// Total successful invocations of the named node.
	pub fn execution_count(&self, node: &str) -> usize {
		self.counters
			.get(node)
			.map(|counter| counter.load(Ordering::Relaxed))
			.unwrap_or(0)
	}

	/// Distinct cells seen at `layer_path` (e.g. `"/job/run/event"`).
	pub fn seen_cell_count(&self, layer_path: &str, missing_ok: bool) -> Result<u64, Error> {
		self.hierarchy.count_for(layer_path, missing_ok)
	}
}

/// The single pump: pulls the driver, routes, and drains on every exit
/// path. The scope stack lives inside the router and is owned here alone.
async fn pump(
	mut driver: Box<dyn Driver>,
	mut router: IndexRouter,
	state: RunState,
	hierarchy: Arc<DataLayerHierarchy>,
) {
	loop {
		if state.is_failed() {
			debug!("pump stopping on error state");
			break;
		}
		match driver.next() {
			Ok(Some(index)) => {
				hierarchy.increment(&index);
				if let Err(error) = router.route(index) {
					state.fail(error);
					break;
				}
			}
			Ok(None) => break,
			Err(error) => {
				state.fail(Error::Driver(error));
				break;
			}
		}
		// Let node actors interleave even on a single worker thread.
		tokio::task::yield_now().await;
	}
	// Close every open scope so in-flight folds can still complete.
	router.drain();
}
