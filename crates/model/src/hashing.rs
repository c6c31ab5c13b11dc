//! Deterministic 64-bit hashing for identifiers and cell indices.
//!
//! Hash quality matters here: identifier comparisons go through the hash
//! first, and index hashes key every cache in the scheduler. `FxHasher` is
//! seedless, so the same input sequence yields the same hash in every run
//! and on every thread, which is the determinism the hashing contract
//! requires.

use std::hash::Hasher;

use rustc_hash::FxHasher;

/// Hashes a bare string.
pub fn str_hash(s: &str) -> u64 {
	let mut h = FxHasher::default();
	h.write(s.as_bytes());
	h.finish()
}

/// Derives a layer hash from the parent layer hash and the layer name.
pub fn layer_hash(parent_layer_hash: u64, layer_name: &str) -> u64 {
	let mut h = FxHasher::default();
	h.write_u64(parent_layer_hash);
	h.write(layer_name.as_bytes());
	h.finish()
}

/// Derives a cell hash from the parent cell hash, the cell number, and the
/// cell's layer hash.
pub fn cell_hash(parent_hash: u64, number: u64, layer_hash: u64) -> u64 {
	let mut h = FxHasher::default();
	h.write_u64(parent_hash);
	h.write_u64(number);
	h.write_u64(layer_hash);
	h.finish()
}
