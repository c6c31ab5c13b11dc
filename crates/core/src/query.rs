//! Product queries: how consumers describe what they want.

use std::fmt;

use strata_model::{Identifier, TypeTag};

/// A description of one desired product: who made it, at which layer, and
/// under which name.
///
/// Creator and layer are mandatory; the suffix (product name) is mandatory
/// for now as well, which registration enforces. The type is deduced from
/// the consuming function's signature and never written by users.
#[derive(Clone, Debug)]
pub struct ProductQuery {
	creator: Identifier,
	layer: Identifier,
	suffix: Option<Identifier>,
	stage: Option<Identifier>,
	tag: Option<TypeTag>,
}

impl ProductQuery {
	pub fn new(creator: impl Into<Identifier>, layer: impl Into<Identifier>) -> Self {
		Self {
			creator: creator.into(),
			layer: layer.into(),
			suffix: None,
			stage: None,
			tag: None,
		}
	}

	pub fn suffix(mut self, suffix: impl Into<Identifier>) -> Self {
		self.suffix = Some(suffix.into());
		self
	}

	pub fn stage(mut self, stage: impl Into<Identifier>) -> Self {
		self.stage = Some(stage.into());
		self
	}

	pub fn creator_name(&self) -> &Identifier {
		&self.creator
	}

	pub fn layer_name(&self) -> &Identifier {
		&self.layer
	}

	pub fn suffix_name(&self) -> Option<&Identifier> {
		self.suffix.as_ref()
	}

	pub fn stage_name(&self) -> Option<&Identifier> {
		self.stage.as_ref()
	}

	pub(crate) fn tag(&self) -> Option<TypeTag> {
		self.tag
	}

	pub(crate) fn set_tag(&mut self, tag: TypeTag) {
		self.tag = Some(tag);
	}

	/// Checks that every product selected by `other` would satisfy `self`.
	pub(crate) fn accepts(&self, other: &ProductQuery) -> bool {
		if self.creator != other.creator {
			return false;
		}
		if self.layer != other.layer {
			return false;
		}
		if let Some(suffix) = &self.suffix {
			if other.suffix.as_ref() != Some(suffix) {
				return false;
			}
		}
		if let Some(stage) = &self.stage {
			if other.stage.as_ref() != Some(stage) {
				return false;
			}
		}
		// An unset tag on either side means "not deduced yet", not a clash.
		if let (Some(mine), Some(theirs)) = (self.tag, other.tag) {
			if mine != theirs {
				return false;
			}
		}
		true
	}

	/// Registration-time validation; each problem becomes one report line.
	pub(crate) fn validate(&self, node: &str, problems: &mut Vec<String>) {
		if self.creator.is_empty() {
			problems.push(format!("{node}: product query with empty creator name"));
		}
		if self.layer.is_empty() {
			problems.push(format!("{node}: product query with empty layer name"));
		}
		match &self.suffix {
			Some(suffix) if suffix.is_empty() => {
				problems.push(format!("{node}: product query with empty suffix"));
			}
			None => {
				problems.push(format!(
					"{node}: product suffixes are mandatory, query '{self}' has none"
				));
			}
			Some(_) => {}
		}
	}
}

impl fmt::Display for ProductQuery {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.suffix {
			Some(suffix) => write!(f, "{}/{} @ {}", self.creator, suffix, self.layer),
			None => write!(f, "{} @ {}", self.creator, self.layer),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn acceptance_requires_creator_and_layer() {
		let want = ProductQuery::new("input", "event").suffix("num");
		let have = ProductQuery::new("input", "event").suffix("num");
		assert!(want.accepts(&have));

		let other_creator = ProductQuery::new("other", "event").suffix("num");
		assert!(!want.accepts(&other_creator));

		let other_layer = ProductQuery::new("input", "run").suffix("num");
		assert!(!want.accepts(&other_layer));
	}

	#[test]
	fn unset_suffix_accepts_any() {
		let want = ProductQuery::new("input", "event");
		let have = ProductQuery::new("input", "event").suffix("num");
		assert!(want.accepts(&have));
		assert!(!have.accepts(&want));
	}

	#[test]
	fn missing_suffix_is_reported() {
		let query = ProductQuery::new("input", "event");
		let mut problems = Vec::new();
		query.validate("observe_num", &mut problems);
		assert_eq!(problems.len(), 1);
		assert!(problems[0].contains("mandatory"));
	}
}
