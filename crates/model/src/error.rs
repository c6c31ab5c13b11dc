//! Product lookup errors.

use thiserror::Error;

/// Errors raised when binding a product out of a store.
#[derive(Debug, Error)]
pub enum ProductError {
	#[error("no product named '{product}'")]
	NoSuchProduct { product: String },

	#[error("product '{product}' holds {found}, but {expected} was requested")]
	TypeMismatch {
		product: String,
		expected: &'static str,
		found: &'static str,
	},
}
