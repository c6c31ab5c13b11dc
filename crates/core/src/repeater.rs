//! The repeater: caches a coarse-layer product and re-emits it once per
//! fine-layer message id.
//!
//! A repeater sits in front of one input of a multi-layer join. The router
//! announces fine-layer ids on the index port before the coarse product has
//! necessarily been produced, so ids may queue ahead of data; conversely the
//! data message can overtake the very first index announcement. Both races
//! are handled below. End tokens from closing scopes tell each entry how
//! many emissions to expect, after which the entry is evicted.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use strata_model::Identifier;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

use crate::message::{EndToken, IndexMessage, Message};
use crate::ports::{PortFn, RepeaterEvent};

#[derive(Default)]
struct CachedProduct {
	data: Option<Message>,
	pending: VecDeque<u64>,
	counter: i64,
	flush_received: bool,
}

pub(crate) struct RepeaterState {
	node_name: String,
	layer: Identifier,
	out: PortFn,
	cache: FxHashMap<u64, CachedProduct>,
	cache_enabled: bool,
}

impl RepeaterState {
	pub fn new(node_name: String, layer: Identifier, out: PortFn) -> Self {
		Self {
			node_name,
			layer,
			out,
			cache: FxHashMap::default(),
			cache_enabled: true,
		}
	}

	pub fn handle(&mut self, event: RepeaterEvent) {
		let key = match event {
			RepeaterEvent::Data(message) => self.handle_data(message),
			RepeaterEvent::Index(message) => self.handle_index(message),
			RepeaterEvent::End(token) => self.handle_end(token),
		};
		self.cleanup(key);
	}

	fn handle_data(&mut self, message: Message) -> u64 {
		let key = message.store.index().hash();

		// Pass-through mode; forward without caching.
		if !self.cache_enabled {
			(self.out)(message);
			return key;
		}

		let out = Arc::clone(&self.out);
		let entry = self.cache.entry(key).or_default();
		entry.data = Some(message);
		entry.counter += emit_pending(&out, entry);
		key
	}

	fn handle_index(&mut self, message: IndexMessage) -> u64 {
		let key = message.index.hash();

		// Caching already disabled; nothing to do.
		if !self.cache_enabled {
			return key;
		}

		// Transition to pass-through: if the data message won the race and
		// is already cached, emit it once under its original id.
		if !message.cache {
			self.cache_enabled = false;
			if let Some(entry) = self.cache.get_mut(&key) {
				if let Some(data) = &entry.data {
					(self.out)(data.clone());
					entry.counter += 1;
				}
			}
			return key;
		}

		let out = Arc::clone(&self.out);
		let entry = self.cache.entry(key).or_default();
		match &entry.data {
			Some(data) => {
				out(Message {
					store: Arc::clone(&data.store),
					id: message.id,
				});
				entry.counter += 1 + emit_pending(&out, entry);
			}
			None => entry.pending.push_back(message.id),
		}
		key
	}

	fn handle_end(&mut self, token: EndToken) -> u64 {
		let key = token.index.hash();
		let entry = self.cache.entry(key).or_default();
		entry.counter -= token.count as i64;
		entry.flush_received = true;
		key
	}

	fn cleanup(&mut self, key: u64) {
		if !self.cache_enabled {
			if let Some(entry) = self.cache.remove(&key) {
				if entry.counter == 0 {
					if let Some(data) = entry.data {
						(self.out)(data);
					}
				}
			}
			return;
		}

		if let Some(entry) = self.cache.get(&key) {
			if entry.flush_received && entry.counter == 0 {
				self.cache.remove(&key);
			}
		}
	}

	#[cfg(test)]
	pub fn cache_is_empty(&self) -> bool {
		self.cache.is_empty()
	}

	#[cfg(test)]
	pub fn cache_size(&self) -> usize {
		self.cache.len()
	}
}

impl Drop for RepeaterState {
	fn drop(&mut self) {
		if self.cache.is_empty() {
			return;
		}

		warn!(
			node = %self.node_name,
			layer = %self.layer,
			entries = self.cache.len(),
			"repeater dropped with cached messages"
		);
		for entry in self.cache.values() {
			match &entry.data {
				Some(data) => warn!(
					node = %self.node_name,
					layer = %self.layer,
					index = %data.store.index(),
					"cached product never flushed"
				),
				None => warn!(
					node = %self.node_name,
					layer = %self.layer,
					"product never received"
				),
			}
		}
	}
}

fn emit_pending(out: &PortFn, entry: &mut CachedProduct) -> i64 {
	let Some(data) = &entry.data else {
		return 0;
	};
	let mut emitted = 0;
	while let Some(id) = entry.pending.pop_front() {
		out(Message {
			store: Arc::clone(&data.store),
			id,
		});
		emitted += 1;
	}
	emitted
}

pub(crate) async fn run_repeater(
	mut rx: UnboundedReceiver<RepeaterEvent>,
	mut state: RepeaterState,
) {
	while let Some(event) = rx.recv().await {
		state.handle(event);
	}
}
