//! Persistence interfaces for strata graphs.
//!
//! The write path is creator-oriented: an output module mirrors every
//! published store into a [`Persistence`] handle, which resolves each
//! (creator, label) pair to a [`Placement`] and drives a [`Storage`]
//! backend chosen by [`Technology`]. Values stay type-erased end to end
//! and reads validate exact type identity.
//!
//! Only the in-memory backend ships here; file-format backends live
//! behind the same traits elsewhere.

pub mod bridge;
pub mod error;
pub mod memory;
pub mod persistence;
pub mod placement;
pub mod storage;
pub mod technology;

pub use bridge::attach_output;
pub use error::{FormError, Result};
pub use persistence::{Persistence, create_persistence};
pub use placement::{Placement, Token};
pub use storage::{OpaqueValue, Storage, create_storage};
pub use technology::Technology;
