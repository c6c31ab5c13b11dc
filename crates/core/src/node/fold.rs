//! Folds: aggregate every message produced within one partition scope.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use strata_model::{Identifier, IndexRef, ProductEntry, ProductStore, ProductValue, Products};

use crate::bind::FoldFn;
use crate::error::Error;
use crate::message::{Message, most_derived};
use crate::node::{RunState, catch_user};
use crate::ports::{FoldEvent, PortFn};
use crate::query::ProductQuery;
use crate::store_counters::CountStores;

/// Type-erased fold state: per-partition accumulators plus the user op.
pub(crate) trait FoldRunner: Send + Sync {
	fn accumulate(&self, parent_hash: u64, messages: &[Message]) -> Result<(), Error>;

	fn take_result(&self, parent_hash: u64) -> Result<ProductEntry, Error>;
}

pub(crate) struct FoldNode {
	pub name: Identifier,
	pub partition: Identifier,
	pub output_name: Identifier,
	pub runner: Arc<dyn FoldRunner>,
	pub counters: CountStores,
	pub outputs: Vec<PortFn>,
	pub calls: Arc<AtomicUsize>,
}

impl FoldNode {
	pub fn process(&self, event: FoldEvent, state: &RunState) {
		match event {
			FoldEvent::Data(set) => {
				let origin = most_derived(&set);
				let index = Arc::clone(origin.store.index());
				// A message outside this partition is simply not ours.
				let Some(parent) = index.parent_named(&self.partition).cloned() else {
					return;
				};
				if let Err(error) = self.runner.accumulate(parent.hash(), &set) {
					state.fail(error);
					return;
				}
				self.calls.fetch_add(1, Ordering::Relaxed);
				self.counters
					.counter_for(parent.hash())
					.increment(index.layer_hash());
				self.emit_if_done(&parent, state);
			}
			FoldEvent::Flush(flush) => {
				if *flush.index.layer_name() != self.partition {
					return;
				}
				if let Some(counts) = &flush.counts {
					self.counters
						.counter_for(flush.index.hash())
						.set_flush_value(Arc::clone(counts), flush.original_id);
				}
				self.emit_if_done(&flush.index, state);
			}
		}
	}

	fn emit_if_done(&self, parent: &IndexRef, state: &RunState) {
		let Some(counter) = self.counters.done_with(parent.hash()) else {
			return;
		};
		match self.runner.take_result(parent.hash()) {
			Ok(entry) => {
				let mut products = Products::new();
				products.add_entry(self.output_name.clone(), entry);
				let store = Arc::new(ProductStore::new(
					Arc::clone(parent),
					self.name.clone(),
					products,
				));
				let outgoing = Message {
					store,
					id: counter.original_id(),
				};
				for port in &self.outputs {
					port(outgoing.clone());
				}
			}
			Err(error) => state.fail(error),
		}
	}
}

/// The typed fold state behind [`FoldRunner`].
///
/// The slot map is locked only to fetch-or-create a slot; the user op runs
/// under the per-slot mutex, so commutative ops may fold concurrently
/// across partitions and arrivals within one partition serialize. Emitted
/// slots are reset rather than erased.
pub(crate) struct TypedFoldRunner<Acc, F, Args> {
	node: String,
	init: Acc,
	op: F,
	queries: Arc<[ProductQuery]>,
	slots: Mutex<FxHashMap<u64, Arc<Mutex<Option<Acc>>>>>,
	_args: PhantomData<fn() -> Args>,
}

impl<Acc, F, Args> TypedFoldRunner<Acc, F, Args> {
	pub fn new(node: String, init: Acc, op: F, queries: Arc<[ProductQuery]>) -> Self {
		Self {
			node,
			init,
			op,
			queries,
			slots: Mutex::new(FxHashMap::default()),
			_args: PhantomData,
		}
	}
}

impl<Acc, F, Args> FoldRunner for TypedFoldRunner<Acc, F, Args>
where
	Acc: ProductValue + Clone,
	F: FoldFn<Acc, Args>,
	Args: 'static,
{
	fn accumulate(&self, parent_hash: u64, messages: &[Message]) -> Result<(), Error> {
		let slot = {
			let mut slots = self.slots.lock();
			Arc::clone(
				slots
					.entry(parent_hash)
					.or_insert_with(|| Arc::new(Mutex::new(Some(self.init.clone())))),
			)
		};
		let mut guard = slot.lock();
		let accumulator = guard.get_or_insert_with(|| self.init.clone());
		catch_user(&self.node, || {
			self.op.invoke(accumulator, messages, &self.queries)
		})
		.and_then(|result| result)
	}

	fn take_result(&self, parent_hash: u64) -> Result<ProductEntry, Error> {
		let slot = self.slots.lock().get(&parent_hash).cloned();
		let Some(slot) = slot else {
			return Err(Error::Invariant(format!(
				"fold '{}' completed a partition it never accumulated",
				self.node
			)));
		};
		let value = slot.lock().take().ok_or_else(|| {
			Error::Invariant(format!("fold '{}' emitted a partition twice", self.node))
		})?;
		Ok(ProductEntry::new(value))
	}
}
