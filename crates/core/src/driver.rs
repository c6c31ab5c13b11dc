//! The driver seam: where data-cell indices come from.

use strata_model::IndexRef;

/// A lazy producer of data-cell indices.
///
/// The pump calls [`next`](Driver::next) until it yields `None`; an `Err`
/// stops the run, drains the scope stack so in-flight folds complete, and
/// surfaces from `execute`. Drivers run on a pool thread and may block.
pub trait Driver: Send + 'static {
	fn next(&mut self) -> anyhow::Result<Option<IndexRef>>;
}

impl<F> Driver for F
where
	F: FnMut() -> anyhow::Result<Option<IndexRef>> + Send + 'static,
{
	fn next(&mut self) -> anyhow::Result<Option<IndexRef>> {
		(self)()
	}
}

/// A driver that yields exactly one index.
pub fn once(index: IndexRef) -> impl Driver {
	let mut slot = Some(index);
	move || anyhow::Ok(slot.take())
}

/// A driver over any in-memory index sequence.
pub fn from_iter<I>(indices: I) -> impl Driver
where
	I: IntoIterator<Item = IndexRef>,
	I::IntoIter: Send + 'static,
{
	let mut iter = indices.into_iter();
	move || anyhow::Ok(iter.next())
}
