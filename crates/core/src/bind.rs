//! Binding stored products into typed user-function arguments.
//!
//! Each consumer carries a descriptor list (its input queries, in slot
//! order). Binding walks the descriptors: slot `i` of the matched tuple is
//! looked up under query `i`'s suffix and downcast to the declared argument
//! type. Lookup and downcast failures surface as retrievable errors, not
//! panics.

use strata_model::{Handle, ProductValue, TypeTag};

use crate::error::Error;
use crate::message::Message;
use crate::query::ProductQuery;

/// An argument type that can be bound out of a message.
pub trait FromMessage: Sized {
	fn tag() -> TypeTag;
	fn bind(message: &Message, query: &ProductQuery) -> Result<Self, Error>;
}

impl<T: ProductValue> FromMessage for Handle<T> {
	fn tag() -> TypeTag {
		TypeTag::of::<T>()
	}

	fn bind(message: &Message, query: &ProductQuery) -> Result<Self, Error> {
		let Some(name) = query.suffix_name() else {
			return Err(Error::Invariant(format!(
				"query '{query}' reached binding without a suffix"
			)));
		};
		message
			.store
			.get_handle::<T>(name)
			.map_err(|e| Error::from_product(e, message.store.source().as_str()))
	}
}

/// A user callable taking `Args` bound from a matched tuple.
///
/// Implemented for plain functions and closures of one to four
/// [`FromMessage`] arguments; the return type is free, so the same trait
/// serves transforms (`-> T`), observers (`-> ()`), predicates (`-> bool`),
/// and unfold-object constructors (`-> Obj`).
pub trait CallableFn<Args>: Send + Sync + 'static {
	type Output;

	const ARITY: usize;

	fn input_tags() -> Vec<TypeTag>;

	fn invoke(&self, messages: &[Message], queries: &[ProductQuery])
	-> Result<Self::Output, Error>;
}

/// A user fold operator `f(&mut Acc, Args...)`.
pub trait FoldFn<Acc, Args>: Send + Sync + 'static {
	const ARITY: usize;

	fn input_tags() -> Vec<TypeTag>;

	fn invoke(
		&self,
		accumulator: &mut Acc,
		messages: &[Message],
		queries: &[ProductQuery],
	) -> Result<(), Error>;
}

macro_rules! impl_callables {
	($($arg:ident : $idx:tt),+) => {
		impl<Func, Out, $($arg,)+> CallableFn<($($arg,)+)> for Func
		where
			Func: Fn($($arg),+) -> Out + Send + Sync + 'static,
			$($arg: FromMessage,)+
		{
			type Output = Out;

			const ARITY: usize = [$(stringify!($arg)),+].len();

			fn input_tags() -> Vec<TypeTag> {
				vec![$($arg::tag()),+]
			}

			fn invoke(
				&self,
				messages: &[Message],
				queries: &[ProductQuery],
			) -> Result<Out, Error> {
				Ok((self)($($arg::bind(&messages[$idx], &queries[$idx])?),+))
			}
		}

		impl<Func, Acc, $($arg,)+> FoldFn<Acc, ($($arg,)+)> for Func
		where
			Func: Fn(&mut Acc, $($arg),+) + Send + Sync + 'static,
			$($arg: FromMessage,)+
		{
			const ARITY: usize = [$(stringify!($arg)),+].len();

			fn input_tags() -> Vec<TypeTag> {
				vec![$($arg::tag()),+]
			}

			fn invoke(
				&self,
				accumulator: &mut Acc,
				messages: &[Message],
				queries: &[ProductQuery],
			) -> Result<(), Error> {
				(self)(accumulator, $($arg::bind(&messages[$idx], &queries[$idx])?),+);
				Ok(())
			}
		}
	};
}

impl_callables!(A1: 0);
impl_callables!(A1: 0, A2: 1);
impl_callables!(A1: 0, A2: 1, A3: 2);
impl_callables!(A1: 0, A2: 1, A3: 2, A4: 3);
