//! Unfolds: expand one parent cell into children at a finer layer.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use strata_model::{FlushCounts, Identifier, ProductEntry, ProductStore, ProductValue, Products};

use crate::bind::CallableFn;
use crate::error::Error;
use crate::hierarchy::DataLayerHierarchy;
use crate::message::{FlushMessage, InputSet, Message, most_derived};
use crate::node::{RunState, catch_user};
use crate::ports::{Flusher, PortFn};
use crate::query::ProductQuery;

/// The iteration state an unfold algorithm advances child by child.
pub trait UnfoldObject {
	type Value;

	fn initial_value(&self) -> Self::Value;
}

/// Type-erased unfold algorithm: build the object from the parent's inputs
/// and emit one product entry per generated child.
pub(crate) trait UnfoldRunner: Send + Sync {
	fn unfold(
		&self,
		messages: &[Message],
		emit: &mut dyn FnMut(ProductEntry),
	) -> Result<(), Error>;
}

pub(crate) struct UnfoldNode {
	pub name: Identifier,
	pub child_layer: Identifier,
	pub output_name: Identifier,
	pub runner: Arc<dyn UnfoldRunner>,
	pub outputs: Vec<PortFn>,
	pub flusher: Flusher,
	pub msg_counter: AtomicU64,
	pub calls: Arc<AtomicUsize>,
	pub hierarchy: Arc<DataLayerHierarchy>,
}

impl UnfoldNode {
	pub fn process(&self, set: InputSet, state: &RunState) {
		let parent = most_derived(&set);
		let parent_index = Arc::clone(parent.store.index());
		let original_id = self.msg_counter.load(Ordering::SeqCst);

		let mut child_counts: BTreeMap<u64, u64> = BTreeMap::new();
		let mut number: u64 = 0;
		let result = self.runner.unfold(&set, &mut |entry| {
			let child_index = parent_index.make_child(number, self.child_layer.clone());
			*child_counts.entry(child_index.layer_hash()).or_default() += 1;

			let mut products = Products::new();
			products.add_entry(self.output_name.clone(), entry);
			let store = Arc::new(ProductStore::new(
				Arc::clone(&child_index),
				self.name.clone(),
				products,
			));
			let outgoing = Message {
				store,
				id: self.msg_counter.fetch_add(1, Ordering::SeqCst),
			};
			for port in &self.outputs {
				port(outgoing.clone());
			}
			// Children never pass through the router, so the hierarchy
			// report learns about them here.
			self.hierarchy.increment(&child_index);
			number += 1;
		});

		match result {
			Ok(()) => {
				self.calls.fetch_add(1, Ordering::Relaxed);
				let counts = (!child_counts.is_empty())
					.then(|| Arc::new(FlushCounts::from_counts(child_counts)));
				// The unfold is the sole flush source for its child layer.
				self.flusher.flush(FlushMessage {
					index: parent_index,
					counts,
					original_id,
				});
			}
			Err(error) => state.fail(error),
		}
	}
}

/// The typed algorithm behind [`UnfoldRunner`]: an object constructor, a
/// continuation predicate, and the step function producing the next value
/// and one child product.
pub(crate) struct TypedUnfoldRunner<C, Args, P, U, Prod> {
	node: String,
	ctor: C,
	predicate: P,
	step: U,
	queries: Arc<[ProductQuery]>,
	_marker: PhantomData<fn() -> (Args, Prod)>,
}

impl<C, Args, P, U, Prod> TypedUnfoldRunner<C, Args, P, U, Prod> {
	pub fn new(node: String, ctor: C, predicate: P, step: U, queries: Arc<[ProductQuery]>) -> Self {
		Self {
			node,
			ctor,
			predicate,
			step,
			queries,
			_marker: PhantomData,
		}
	}
}

impl<C, Args, P, U, Prod> UnfoldRunner for TypedUnfoldRunner<C, Args, P, U, Prod>
where
	C: CallableFn<Args>,
	C::Output: UnfoldObject,
	P: Fn(&C::Output, &<C::Output as UnfoldObject>::Value) -> bool + Send + Sync + 'static,
	U: Fn(
			&C::Output,
			<C::Output as UnfoldObject>::Value,
		) -> (<C::Output as UnfoldObject>::Value, Prod)
		+ Send
		+ Sync
		+ 'static,
	Prod: ProductValue,
	Args: 'static,
{
	fn unfold(
		&self,
		messages: &[Message],
		emit: &mut dyn FnMut(ProductEntry),
	) -> Result<(), Error> {
		catch_user(&self.node, || -> Result<(), Error> {
			let object = self.ctor.invoke(messages, &self.queries)?;
			let mut value = object.initial_value();
			while (self.predicate)(&object, &value) {
				let (next, product) = (self.step)(&object, value);
				emit(ProductEntry::new(product));
				value = next;
			}
			Ok(())
		})
		.and_then(|result| result)
	}
}
