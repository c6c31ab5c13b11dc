//! Backend selection.

use std::str::FromStr;

use crate::error::FormError;

/// Which storage backend holds the bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Technology {
	Memory,
}

impl FromStr for Technology {
	type Err = FormError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"memory" | "MEMORY" => Ok(Self::Memory),
			other => Err(FormError::UnknownTechnology(other.to_owned())),
		}
	}
}
