//! Channel plumbing between graph nodes.
//!
//! Every edge is an unbounded tokio mpsc channel, which gives per-edge FIFO
//! delivery and keeps the single-threaded router pump free of await points.
//! A [`PortFn`] erases what sits behind an input port (a plain consumer, a
//! join slot, a repeater, or a gate collector) so producers just call it.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::message::{EndToken, FlushMessage, IndexMessage, InputSet, Message, PredicateVerdict};

/// An erased input port; sending never blocks and delivery failures mean the
/// receiver already shut down, which only happens on the error path.
pub(crate) type PortFn = Arc<dyn Fn(Message) + Send + Sync>;

/// An erased matched-tuple port (the downstream side of a join).
pub(crate) type SetFn = Arc<dyn Fn(InputSet) + Send + Sync>;

/// The merged input stream of a repeater.
pub(crate) enum RepeaterEvent {
	Data(Message),
	Index(IndexMessage),
	End(EndToken),
}

/// The merged input stream of a predicate gate.
pub(crate) enum GateEvent {
	Data(Message),
	Verdict(PredicateVerdict),
}

/// The merged input stream of a fold.
pub(crate) enum FoldEvent {
	Data(InputSet),
	Flush(FlushMessage),
}

pub(crate) fn join_port(tx: &UnboundedSender<(usize, Message)>, slot: usize) -> PortFn {
	let tx = tx.clone();
	Arc::new(move |message| {
		let _ = tx.send((slot, message));
	})
}

pub(crate) fn repeater_port(tx: &UnboundedSender<RepeaterEvent>) -> PortFn {
	let tx = tx.clone();
	Arc::new(move |message| {
		let _ = tx.send(RepeaterEvent::Data(message));
	})
}

pub(crate) fn gate_port(tx: &UnboundedSender<GateEvent>) -> PortFn {
	let tx = tx.clone();
	Arc::new(move |message| {
		let _ = tx.send(GateEvent::Data(message));
	})
}

pub(crate) fn set_into_consumer(tx: &UnboundedSender<InputSet>) -> SetFn {
	let tx = tx.clone();
	Arc::new(move |set| {
		let _ = tx.send(set);
	})
}

pub(crate) fn set_into_fold(tx: &UnboundedSender<FoldEvent>) -> SetFn {
	let tx = tx.clone();
	Arc::new(move |set| {
		let _ = tx.send(FoldEvent::Data(set));
	})
}

/// Broadcast side of flush delivery; folds subscribe at finalize.
#[derive(Default)]
pub(crate) struct Flusher {
	subscribers: Vec<UnboundedSender<FoldEvent>>,
}

impl Flusher {
	pub fn subscribe(&mut self, tx: UnboundedSender<FoldEvent>) {
		self.subscribers.push(tx);
	}

	pub fn flush(&self, message: FlushMessage) {
		for subscriber in &self.subscribers {
			let _ = subscriber.send(FoldEvent::Flush(message.clone()));
		}
	}
}
