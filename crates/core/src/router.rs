//! The index router: turns the driver's stream of data-cell indices into
//! per-consumer message flows and scope lifetimes.
//!
//! The router is owned by the single pump task. It keeps a stack of layer
//! scopes; entering an index first pops every scope at the same or deeper
//! depth (emitting that scope's end tokens and flush message), then
//! broadcasts the index to provider inputs and multi-layer join slots, and
//! finally pushes a fresh scope. Lookup results are memoised by layer hash,
//! and all memos hold slot *indices* into one arena rather than references.

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use strata_model::{DataCellIndex, FlushCounters, Identifier, IndexRef};
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use crate::error::Error;
use crate::message::{EndToken, FlushMessage, IndexMessage, MessageId};
use crate::ports::{Flusher, RepeaterEvent};
use crate::query::ProductQuery;

/// One repeater input of a multi-layer consumer, as seen by the router.
pub(crate) struct NamedIndexPort {
	pub layer: Identifier,
	pub tx: UnboundedSender<RepeaterEvent>,
}

/// One provider's index input together with the query it serves.
pub(crate) struct ProviderPort {
	pub query: ProductQuery,
	pub tx: UnboundedSender<IndexMessage>,
}

/// Splits a (possibly slash-delimited) layer spec into identifier segments.
fn layer_segments(layer: &Identifier) -> Vec<Identifier> {
	layer
		.as_str()
		.split('/')
		.filter(|s| !s.is_empty())
		.map(Identifier::new)
		.collect()
}

/// True when `segments` is a suffix of the index's layer path, comparing
/// slash-delimited segments as identifiers.
fn suffix_matches(index: &DataCellIndex, segments: &[Identifier]) -> bool {
	let mut current = Some(index);
	for segment in segments.iter().rev() {
		match current {
			Some(level) if *level.layer_name() == *segment => {
				current = level.parent().map(|p| &**p);
			}
			_ => return false,
		}
	}
	true
}

struct Broadcaster {
	layer: Identifier,
	segments: Vec<Identifier>,
	ports: Vec<UnboundedSender<IndexMessage>>,
}

/// Routing and flushing state for a single layer slot of a multi-layer
/// consumer: delivers index messages to the slot's repeater, and counts the
/// parent-routed messages so scope exit can emit a matching end token.
struct MultilayerSlot {
	layer: Identifier,
	segments: Vec<Identifier>,
	tx: UnboundedSender<RepeaterEvent>,
	counter: u64,
}

impl MultilayerSlot {
	fn put_message(&mut self, index: &IndexRef, id: MessageId) {
		if *index.layer_name() == self.layer {
			// The slot sits at the index's own layer: no caching needed.
			let _ = self.tx.send(RepeaterEvent::Index(IndexMessage {
				index: Arc::clone(index),
				id,
				cache: false,
			}));
			return;
		}

		let Some(parent) = index.parent_named(&self.layer) else {
			return;
		};
		// Counted so the scope can tell the repeater how many ids were
		// issued against the cached parent product.
		self.counter += 1;
		let _ = self.tx.send(RepeaterEvent::Index(IndexMessage {
			index: Arc::clone(parent),
			id,
			cache: true,
		}));
	}

	fn put_end_token(&mut self, index: &IndexRef) {
		let count = mem::take(&mut self.counter);
		if count == 0 {
			return;
		}
		let _ = self.tx.send(RepeaterEvent::End(EndToken {
			index: Arc::clone(index),
			count,
		}));
	}
}

struct LayerScope {
	index: IndexRef,
	message_id: MessageId,
	layer_hash: u64,
}

pub(crate) struct IndexRouter {
	received: AtomicU64,
	scopes: Vec<LayerScope>,
	counters: FlushCounters,
	flusher: Flusher,
	broadcasters: Vec<Broadcaster>,
	slots: Vec<MultilayerSlot>,
	/// Per multi-layer consumer: name and the slot ids that belong to it.
	consumers: Vec<(String, Vec<usize>)>,
	matched_broadcasters: FxHashMap<u64, Option<usize>>,
	matched_routing: FxHashMap<u64, Vec<usize>>,
	matched_flushing: FxHashMap<u64, Vec<usize>>,
	drained: bool,
}

impl IndexRouter {
	pub fn new(
		provider_ports: Vec<ProviderPort>,
		multilayers: Vec<(String, Vec<NamedIndexPort>)>,
		flusher: Flusher,
	) -> Self {
		let mut broadcasters: Vec<Broadcaster> = Vec::new();
		for port in provider_ports {
			let layer = port.query.layer_name().clone();
			match broadcasters.iter_mut().find(|b| b.layer == layer) {
				Some(existing) => existing.ports.push(port.tx),
				None => broadcasters.push(Broadcaster {
					segments: layer_segments(&layer),
					layer,
					ports: vec![port.tx],
				}),
			}
		}

		let mut slots = Vec::new();
		let mut consumers = Vec::new();
		for (name, index_ports) in multilayers {
			trace!(node = %name, "creating multilayer slots");
			let mut slot_ids = Vec::with_capacity(index_ports.len());
			for port in index_ports {
				slot_ids.push(slots.len());
				slots.push(MultilayerSlot {
					segments: layer_segments(&port.layer),
					layer: port.layer,
					tx: port.tx,
					counter: 0,
				});
			}
			consumers.push((name, slot_ids));
		}

		Self {
			received: AtomicU64::new(0),
			scopes: Vec::new(),
			counters: FlushCounters::default(),
			flusher,
			broadcasters,
			slots,
			consumers,
			matched_broadcasters: FxHashMap::default(),
			matched_routing: FxHashMap::default(),
			matched_flushing: FxHashMap::default(),
			drained: false,
		}
	}

	/// Ingests one index from the driver.
	pub fn route(&mut self, index: IndexRef) -> Result<(), Error> {
		if self.drained {
			return Err(Error::Invariant(String::from(
				"route called after the router was drained",
			)));
		}

		self.backout_to(&index);

		let message_id = self.received.fetch_add(1, Ordering::SeqCst);
		trace!(index = %index, message_id, "routing index");

		self.send_to_provider_index_nodes(&index, message_id)?;
		self.send_to_multilayer_join_nodes(&index, message_id);

		self.counters.update(&index);
		self.scopes.push(LayerScope {
			layer_hash: index.layer_hash(),
			index,
			message_id,
		});
		Ok(())
	}

	/// Pops every remaining scope; called at end-of-input and on error.
	pub fn drain(&mut self) {
		while !self.scopes.is_empty() {
			self.pop_scope();
		}
		self.drained = true;
	}

	fn backout_to(&mut self, index: &IndexRef) {
		let new_depth = index.depth();
		while self
			.scopes
			.last()
			.is_some_and(|top| new_depth <= top.index.depth())
		{
			self.pop_scope();
		}
	}

	/// The scope termination sequence: end tokens to every exactly-matching
	/// slot, then the flush message for folds.
	fn pop_scope(&mut self) {
		let Some(scope) = self.scopes.pop() else {
			return;
		};

		let flushing = self
			.matched_flushing
			.get(&scope.layer_hash)
			.cloned()
			.unwrap_or_default();
		for slot_id in flushing {
			self.slots[slot_id].put_end_token(&scope.index);
		}

		let counts = self.counters.extract(&scope.index);
		let counts = (!counts.is_empty()).then(|| Arc::new(counts));
		trace!(index = %scope.index, "closing scope");
		self.flusher.flush(FlushMessage {
			index: scope.index,
			counts,
			original_id: scope.message_id,
		});
	}

	fn send_to_provider_index_nodes(
		&mut self,
		index: &IndexRef,
		message_id: MessageId,
	) -> Result<(), Error> {
		let layer_hash = index.layer_hash();
		if let Some(&memo) = self.matched_broadcasters.get(&layer_hash) {
			// Not every layer has a broadcaster; misses are memoised too.
			if let Some(broadcaster_id) = memo {
				send_index(&self.broadcasters[broadcaster_id], index, message_id);
			}
			return Ok(());
		}

		let candidates: Vec<usize> = self
			.broadcasters
			.iter()
			.enumerate()
			.filter(|(_, b)| suffix_matches(index, &b.segments))
			.map(|(i, _)| i)
			.collect();

		let matched = match candidates.as_slice() {
			[] => None,
			[only] => Some(*only),
			many => {
				let mut report = format!(
					"multiple provider layers match index layer {}:\n",
					index.layer_path()
				);
				for &candidate in many {
					report.push_str("\n- ");
					report.push_str(self.broadcasters[candidate].layer.as_str());
				}
				return Err(Error::Misconfiguration(report));
			}
		};

		if let Some(broadcaster_id) = matched {
			send_index(&self.broadcasters[broadcaster_id], index, message_id);
		}
		self.matched_broadcasters.insert(layer_hash, matched);
		Ok(())
	}

	fn send_to_multilayer_join_nodes(&mut self, index: &IndexRef, message_id: MessageId) {
		let layer_hash = index.layer_hash();

		if let Some(routing) = self.matched_routing.get(&layer_hash).cloned() {
			for slot_id in routing {
				self.slots[slot_id].put_message(index, message_id);
			}
			return;
		}

		let mut routing = Vec::new();
		let mut flushing = Vec::new();

		// A consumer's slots are routed as a unit: deliver to all of them iff
		// at least one slot sits exactly at this index's layer and every
		// other slot names an ancestor layer. Flushing applies to exactly
		// matching slots regardless of whether routing was accepted.
		for (_, slot_ids) in &self.consumers {
			let mut matching = Vec::with_capacity(slot_ids.len());
			let mut has_exact_match = false;

			for &slot_id in slot_ids {
				let slot = &self.slots[slot_id];
				if suffix_matches(index, &slot.segments) {
					has_exact_match = true;
					flushing.push(slot_id);
					matching.push(slot_id);
				} else if index.parent_named(&slot.layer).is_some() {
					matching.push(slot_id);
				}
			}

			if has_exact_match && matching.len() == slot_ids.len() {
				routing.extend(matching);
			}
		}

		for &slot_id in &routing {
			self.slots[slot_id].put_message(index, message_id);
		}
		self.matched_routing.insert(layer_hash, routing);
		self.matched_flushing.insert(layer_hash, flushing);
	}
}

fn send_index(broadcaster: &Broadcaster, index: &IndexRef, message_id: MessageId) {
	for port in &broadcaster.ports {
		let _ = port.send(IndexMessage {
			index: Arc::clone(index),
			id: message_id,
			cache: true,
		});
	}
}
