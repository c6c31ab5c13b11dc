//! strata-core: a hierarchical dataflow scheduler.
//!
//! # Mental model
//!
//! - A *driver* yields [`DataCellIndex`] coordinates top-down
//!   (`/job/run/event`, ...). The single pump routes each index through
//!   the index router, which owns a stack of layer *scopes*: entering an
//!   index closes every scope at the same or deeper depth, and closing a
//!   scope emits end tokens to repeaters and a flush message to folds.
//! - Providers fire once per routed index of their layer; their products
//!   travel as [`Message`]s whose router-assigned id is the sole join key.
//! - A consumer whose inputs span layers gets one repeater per input: the
//!   coarse product is cached and re-emitted once per fine-layer id, with
//!   ids queueing when they precede the data.
//! - Folds count arrivals per partition scope and emit exactly once, when
//!   the scope's flush message confirms every child was seen. Unfolds
//!   expand a parent into children at a finer layer and are the sole flush
//!   source for that child layer.
//! - Execution is one actor task per node on a bounded pool; the first
//!   error cancels the driver, the scope stack drains so in-flight folds
//!   finish, and `execute` returns that error after quiescence.

mod bind;
mod catalog;
mod config;
mod driver;
mod edges;
mod error;
mod gate;
mod generator;
mod graph;
mod hierarchy;
mod join;
mod message;
mod node;
mod ports;
mod query;
mod registration;
mod repeater;
mod router;
mod store_counters;

pub use bind::{CallableFn, FoldFn, FromMessage};
pub use config::{Concurrency, RunConfig};
pub use driver::{Driver, from_iter, once};
pub use error::Error;
pub use generator::{LayerGenerator, LayerSpec};
pub use graph::FrameworkGraph;
pub use message::{
	EndToken, FlushMessage, IndexMessage, InputSet, Message, MessageId, PredicateVerdict,
	most_derived,
};
pub use node::unfold::UnfoldObject;
pub use query::ProductQuery;
pub use registration::{
	FoldBuilder, ObserverBuilder, OutputsBuilder, PredicateBuilder, ProviderBuilder,
	TransformBuilder, UnfoldBuilder, WhenBuilder,
};

pub use strata_model as model;
pub use strata_model::{DataCellIndex, Handle, Identifier, IndexRef, ProductStore, StoreRef};
