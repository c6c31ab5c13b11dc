//! Hierarchical data-cell coordinates.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::hashing;
use crate::identifier::Identifier;

/// Shared reference to an immutable [`DataCellIndex`].
pub type IndexRef = Arc<DataCellIndex>;

/// Layer name of the base (root) index.
pub const BASE_LAYER_NAME: &str = "job";

/// Sentinel cell number carried by the base index.
pub const BASE_NUMBER: u64 = u64::MAX;

static BASE: LazyLock<IndexRef> = LazyLock::new(|| {
	let layer_name = Identifier::new(BASE_LAYER_NAME);
	let layer_hash = hashing::str_hash(BASE_LAYER_NAME);
	Arc::new(DataCellIndex {
		parent: None,
		number: BASE_NUMBER,
		layer_name,
		layer_hash,
		depth: 0,
		hash: 0,
	})
});

/// One coordinate in the data-cell hierarchy.
///
/// Indices form a rooted tree: the base index sits at depth 0 under the
/// `"job"` layer, and every other index is created through
/// [`make_child`](DataCellIndex::make_child). Once constructed an index is
/// never mutated, and both hashes obey the derivation contract
/// `layer_hash = H(parent.layer_hash, layer_name)`,
/// `hash = H(parent.hash, number, layer_hash)`.
pub struct DataCellIndex {
	parent: Option<IndexRef>,
	number: u64,
	layer_name: Identifier,
	layer_hash: u64,
	depth: usize,
	hash: u64,
}

impl DataCellIndex {
	/// The base index shared by every hierarchy.
	pub fn base() -> &'static IndexRef {
		&BASE
	}

	/// Creates the child of `self` numbered `number` in layer `layer_name`.
	pub fn make_child(self: &Arc<Self>, number: u64, layer_name: impl Into<Identifier>) -> IndexRef {
		let layer_name = layer_name.into();
		let layer_hash = hashing::layer_hash(self.layer_hash, layer_name.as_str());
		Arc::new(DataCellIndex {
			parent: Some(Arc::clone(self)),
			number,
			layer_name,
			layer_hash,
			depth: self.depth + 1,
			hash: hashing::cell_hash(self.hash, number, layer_hash),
		})
	}

	pub fn layer_name(&self) -> &Identifier {
		&self.layer_name
	}

	pub fn number(&self) -> u64 {
		self.number
	}

	pub fn depth(&self) -> usize {
		self.depth
	}

	pub fn hash(&self) -> u64 {
		self.hash
	}

	pub fn layer_hash(&self) -> u64 {
		self.layer_hash
	}

	pub fn has_parent(&self) -> bool {
		self.parent.is_some()
	}

	pub fn parent(&self) -> Option<&IndexRef> {
		self.parent.as_ref()
	}

	/// Nearest ancestor whose layer name is `layer_name`, if any.
	pub fn parent_named(&self, layer_name: &Identifier) -> Option<&IndexRef> {
		let mut current = self.parent.as_ref();
		while let Some(parent) = current {
			if parent.layer_name == *layer_name {
				return Some(parent);
			}
			current = parent.parent.as_ref();
		}
		None
	}

	/// Slash-delimited layer names from the root to this index.
	pub fn layer_path(&self) -> String {
		let mut names = vec![self.layer_name.as_str()];
		let mut current = self.parent.as_ref();
		while let Some(parent) = current {
			names.push(parent.layer_name.as_str());
			current = parent.parent.as_ref();
		}
		let mut path = String::new();
		for name in names.iter().rev() {
			path.push('/');
			path.push_str(name);
		}
		path
	}

	/// Cell numbers from the root to this index (the base contributes none).
	fn numbers(&self) -> Vec<u64> {
		let mut result = vec![0; self.depth];
		let mut current = self;
		for slot in (0..self.depth).rev() {
			result[slot] = current.number;
			current = current.parent.as_deref().unwrap_or(current);
		}
		result
	}
}

impl PartialEq for DataCellIndex {
	fn eq(&self, other: &Self) -> bool {
		if self.depth != other.depth {
			return false;
		}
		if self.number != other.number {
			return false;
		}
		match (&self.parent, &other.parent) {
			(Some(a), Some(b)) => a == b,
			(None, None) => true,
			_ => false,
		}
	}
}

impl Eq for DataCellIndex {}

impl PartialOrd for DataCellIndex {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for DataCellIndex {
	fn cmp(&self, other: &Self) -> Ordering {
		self.numbers().cmp(&other.numbers())
	}
}

impl std::hash::Hash for DataCellIndex {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		state.write_u64(self.hash);
	}
}

impl fmt::Display for DataCellIndex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("[")?;
		if self.number != BASE_NUMBER {
			let mut segments = Vec::with_capacity(self.depth);
			let mut current = Some(self);
			while let Some(index) = current {
				if index.number == BASE_NUMBER {
					break;
				}
				segments.push(format!("{}:{}", index.layer_name, index.number));
				current = index.parent.as_deref();
			}
			for (i, segment) in segments.iter().rev().enumerate() {
				if i > 0 {
					f.write_str(", ")?;
				}
				f.write_str(segment)?;
			}
		}
		f.write_str("]")
	}
}

impl fmt::Debug for DataCellIndex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{self}")
	}
}
