//! Data model for the strata dataflow framework.
//!
//! Everything in this crate is concerned with *what* flows through a graph,
//! not *how* it flows: hierarchical [`DataCellIndex`] coordinates, the
//! type-erased [`Products`] bag, the frozen-on-publication [`ProductStore`],
//! and the per-layer child counts ([`FlushCounts`]) that scope teardown
//! reports to aggregating consumers.

pub mod counter;
pub mod error;
pub mod handle;
pub mod hashing;
pub mod identifier;
pub mod index;
pub mod products;
pub mod store;
pub mod tag;

pub use counter::{FlushCounters, FlushCounts};
pub use error::ProductError;
pub use handle::Handle;
pub use identifier::Identifier;
pub use index::{DataCellIndex, IndexRef, BASE_LAYER_NAME, BASE_NUMBER};
pub use products::{ProductEntry, ProductValue, Products};
pub use store::{ProductStore, StoreRef};
pub use tag::TypeTag;
