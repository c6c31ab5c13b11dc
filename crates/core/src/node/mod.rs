//! The node runtime: one actor task per declared node.
//!
//! Every node consumes its merged input channel under a concurrency policy.
//! `Serial` nodes run user code inline in the actor loop; the other
//! policies spawn one pool task per message, bounded by a semaphore for
//! `Limited(n)`. User code may block; that occupies one pool thread, which
//! is exactly the resource the policy accounts for.
//!
//! User bodies are infallible closures; panics are caught at the node
//! boundary and recorded as the run's first error, which cancels the driver
//! and starts the drain.

pub(crate) mod fold;
pub(crate) mod observer;
pub(crate) mod output;
pub(crate) mod predicate;
pub(crate) mod provider;
pub(crate) mod transform;
pub(crate) mod unfold;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::config::Concurrency;
use crate::error::Error;

/// Shared run status: the first error wins and cancels everything else.
#[derive(Clone, Default)]
pub(crate) struct RunState {
	first_error: Arc<Mutex<Option<Error>>>,
	token: CancellationToken,
}

impl RunState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn fail(&self, err: Error) {
		{
			let mut slot = self.first_error.lock();
			if slot.is_none() {
				error!(%err, "run entered error state");
				*slot = Some(err);
			}
		}
		self.token.cancel();
	}

	pub fn is_failed(&self) -> bool {
		self.token.is_cancelled()
	}

	pub fn take_error(&self) -> Option<Error> {
		self.first_error.lock().take()
	}
}

/// Runs a user body, converting a panic into [`Error::User`].
pub(crate) fn catch_user<R>(node: &str, body: impl FnOnce() -> R) -> Result<R, Error> {
	catch_unwind(AssertUnwindSafe(body)).map_err(|payload| Error::user_panic(node, payload))
}

/// The shared actor loop: drains `rx` through `process` under `concurrency`.
///
/// The loop stops early once the run is failed; already-spawned invocations
/// are still awaited so quiescence means quiescence.
pub(crate) async fn consume<T, F>(
	mut rx: UnboundedReceiver<T>,
	concurrency: Concurrency,
	state: RunState,
	process: F,
) where
	T: Send + 'static,
	F: Fn(T) + Send + Sync + 'static,
{
	if let Concurrency::Serial = concurrency {
		while let Some(item) = rx.recv().await {
			if state.is_failed() {
				break;
			}
			process(item);
		}
		return;
	}

	let semaphore = match concurrency {
		Concurrency::Limited(n) => Some(Arc::new(Semaphore::new(n.max(1)))),
		_ => None,
	};
	let process = Arc::new(process);
	let mut tasks: JoinSet<()> = JoinSet::new();

	loop {
		tokio::select! {
			item = rx.recv() => {
				let Some(item) = item else { break };
				if state.is_failed() {
					break;
				}
				let permit = match &semaphore {
					// The semaphore lives as long as this loop and is never
					// closed; if acquisition fails anyway, running the
					// invocation uncapped is not an option.
					Some(semaphore) => match Arc::clone(semaphore).acquire_owned().await {
						Ok(permit) => Some(permit),
						Err(_) => break,
					},
					None => None,
				};
				let process = Arc::clone(&process);
				tasks.spawn(async move {
					let _permit = permit;
					process(item);
				});
			}
			Some(result) = tasks.join_next(), if !tasks.is_empty() => {
				reap(result, &state);
			}
		}
	}

	while let Some(result) = tasks.join_next().await {
		reap(result, &state);
	}
}

fn reap(result: Result<(), tokio::task::JoinError>, state: &RunState) {
	if let Err(join_error) = result {
		state.fail(Error::Invariant(format!(
			"node invocation task failed: {join_error}"
		)));
	}
}
