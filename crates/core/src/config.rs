//! Run configuration.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

use crate::error::Error;

/// How many invocations of one node may run at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Concurrency {
	/// One at a time; the only safe choice for stateful user code.
	Serial,
	/// As many as the pool will run.
	Unlimited,
	/// At most this many in flight.
	Limited(usize),
}

impl<'de> Deserialize<'de> for Concurrency {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct ConcurrencyVisitor;

		impl Visitor<'_> for ConcurrencyVisitor {
			type Value = Concurrency;

			fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str("\"serial\", \"unlimited\", or a positive integer")
			}

			fn visit_str<E: de::Error>(self, value: &str) -> Result<Concurrency, E> {
				match value {
					"serial" => Ok(Concurrency::Serial),
					"unlimited" => Ok(Concurrency::Unlimited),
					other => Err(E::custom(format!("unknown concurrency '{other}'"))),
				}
			}

			fn visit_i64<E: de::Error>(self, value: i64) -> Result<Concurrency, E> {
				if value <= 0 {
					return Err(E::custom("concurrency must be positive"));
				}
				Ok(Concurrency::Limited(value as usize))
			}

			fn visit_u64<E: de::Error>(self, value: u64) -> Result<Concurrency, E> {
				if value == 0 {
					return Err(E::custom("concurrency must be positive"));
				}
				Ok(Concurrency::Limited(value as usize))
			}
		}

		deserializer.deserialize_any(ConcurrencyVisitor)
	}
}

/// Options recognized by [`FrameworkGraph`](crate::graph::FrameworkGraph).
///
/// ```toml
/// max_parallelism = 4
///
/// [concurrency]
/// heavy_transform = "serial"
/// light_observer = "unlimited"
/// io_bound = 2
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct RunConfig {
	/// Worker-thread count of the execution pool.
	#[serde(default = "default_parallelism")]
	pub max_parallelism: usize,

	/// Per-node concurrency overrides, applied at finalize.
	#[serde(default)]
	pub concurrency: BTreeMap<String, Concurrency>,
}

impl Default for RunConfig {
	fn default() -> Self {
		Self {
			max_parallelism: default_parallelism(),
			concurrency: BTreeMap::new(),
		}
	}
}

impl RunConfig {
	pub fn with_max_parallelism(max_parallelism: usize) -> Self {
		Self {
			max_parallelism,
			..Self::default()
		}
	}

	pub fn from_toml_str(text: &str) -> Result<Self, Error> {
		let config: Self =
			toml::from_str(text).map_err(|e| Error::Misconfiguration(e.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	pub(crate) fn validate(&self) -> Result<(), Error> {
		if self.max_parallelism == 0 {
			return Err(Error::Misconfiguration(String::from(
				"max_parallelism must be a positive integer",
			)));
		}
		Ok(())
	}

	pub(crate) fn concurrency_for(&self, node: &str, registered: Concurrency) -> Concurrency {
		self.concurrency.get(node).copied().unwrap_or(registered)
	}
}

fn default_parallelism() -> usize {
	std::thread::available_parallelism()
		.map(|n| n.get())
		.unwrap_or(1)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_overrides() {
		let config = RunConfig::from_toml_str(
			r#"
			max_parallelism = 3

			[concurrency]
			add = "serial"
			scale = "unlimited"
			io = 2
			"#,
		)
		.unwrap();

		assert_eq!(config.max_parallelism, 3);
		assert_eq!(config.concurrency["add"], Concurrency::Serial);
		assert_eq!(config.concurrency["scale"], Concurrency::Unlimited);
		assert_eq!(config.concurrency["io"], Concurrency::Limited(2));
	}

	#[test]
	fn rejects_zero_parallelism() {
		assert!(RunConfig::from_toml_str("max_parallelism = 0").is_err());
	}

	#[test]
	fn overrides_win_over_registration() {
		let config = RunConfig::from_toml_str("[concurrency]\nadd = 4").unwrap();
		assert_eq!(
			config.concurrency_for("add", Concurrency::Serial),
			Concurrency::Limited(4)
		);
		assert_eq!(
			config.concurrency_for("other", Concurrency::Serial),
			Concurrency::Serial
		);
	}
}
