//! Message envelopes flowing through the graph.

use std::sync::Arc;

use smallvec::SmallVec;
use strata_model::{FlushCounts, IndexRef, StoreRef};

/// Router-assigned sequence number; the sole join key.
pub type MessageId = u64;

/// One published store travelling to consumers.
#[derive(Clone)]
pub struct Message {
	pub store: StoreRef,
	pub id: MessageId,
}

/// A data-cell index announced to providers and repeaters.
///
/// `cache` tells a repeater whether the product for this index should be
/// held for later fine-layer ids (`true`) or passed straight through
/// (`false`, sent when the index sits at the consumer's own layer).
#[derive(Clone)]
pub struct IndexMessage {
	pub index: IndexRef,
	pub id: MessageId,
	pub cache: bool,
}

/// Tells a repeater that `count` messages bearing `index` have been issued
/// and no more will follow.
#[derive(Clone)]
pub struct EndToken {
	pub index: IndexRef,
	pub count: u64,
}

/// Tells a fold that the scope for `index` has closed.
///
/// `counts` is absent when the scope saw no children at all.
#[derive(Clone)]
pub struct FlushMessage {
	pub index: IndexRef,
	pub counts: Option<Arc<FlushCounts>>,
	pub original_id: MessageId,
}

/// One predicate's decision about one message id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PredicateVerdict {
	pub id: MessageId,
	pub accepted: bool,
}

/// The matched tuple a consumer receives, one message per input port.
pub type InputSet = SmallVec<[Message; 2]>;

/// Of a matched tuple, the message whose index sits deepest.
pub fn most_derived(messages: &[Message]) -> &Message {
	debug_assert!(!messages.is_empty());
	let mut best = &messages[0];
	for candidate in &messages[1..] {
		if candidate.store.index().depth() > best.store.index().depth() {
			best = candidate;
		}
	}
	best
}
