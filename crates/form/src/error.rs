//! Persistence error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormError {
	#[error("unknown technology '{0}'")]
	UnknownTechnology(String),

	#[error("no container '{container}'")]
	UnknownContainer { container: String },

	#[error("container '{container}' stores {stored}, not {requested}")]
	TypeMismatch {
		container: String,
		stored: &'static str,
		requested: &'static str,
	},

	#[error("no entry '{id}' in container '{container}'")]
	MissingEntry { container: String, id: String },

	#[error("commit on container '{container}' with nothing staged")]
	NothingStaged { container: String },
}

pub type Result<T> = std::result::Result<T, FormError>;
