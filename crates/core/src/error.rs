//! The framework error taxonomy.

use std::any::Any;

use strata_model::ProductError;
use thiserror::Error;

/// Everything that can go wrong while configuring or executing a graph.
#[derive(Debug, Error)]
pub enum Error {
	/// A store lookup by product name found nothing.
	#[error("no product named '{product}' in store created by {source_store}")]
	NoSuchProduct { product: String, source_store: String },

	/// A store lookup found the product under a different type.
	#[error("product '{product}' holds {found}, but {expected} was requested")]
	TypeMismatch {
		product: String,
		expected: &'static str,
		found: &'static str,
	},

	/// Bad registration or wiring, reported in aggregate at finalize.
	#[error("configuration errors:\n{0}")]
	Misconfiguration(String),

	/// An internal contract was violated; this is a framework bug.
	#[error("invariant violated: {0}")]
	Invariant(String),

	/// A user node body panicked.
	#[error("node '{node}' failed: {message}")]
	User { node: String, message: String },

	/// The driver failed while producing indices.
	#[error("driver failed: {0}")]
	Driver(anyhow::Error),
}

impl Error {
	/// Aggregates registration errors into one report.
	pub(crate) fn misconfiguration(errors: &[String]) -> Self {
		let mut report = String::new();
		for error in errors {
			report.push_str("  - ");
			report.push_str(error);
			report.push('\n');
		}
		Self::Misconfiguration(report)
	}

	/// Wraps a panic payload raised inside the named node.
	pub(crate) fn user_panic(node: &str, payload: Box<dyn Any + Send>) -> Self {
		let message = if let Some(text) = payload.downcast_ref::<&str>() {
			(*text).to_owned()
		} else if let Some(text) = payload.downcast_ref::<String>() {
			text.clone()
		} else {
			String::from("panic with non-string payload")
		};
		Self::User {
			node: node.to_owned(),
			message,
		}
	}

	/// Attaches the creating store's source to a product lookup failure.
	pub(crate) fn from_product(error: ProductError, source: &str) -> Self {
		match error {
			ProductError::NoSuchProduct { product } => Self::NoSuchProduct {
				product,
				source_store: source.to_owned(),
			},
			ProductError::TypeMismatch {
				product,
				expected,
				found,
			} => Self::TypeMismatch {
				product,
				expected,
				found,
			},
		}
	}
}
