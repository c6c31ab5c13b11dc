//! The node registration surface.
//!
//! Registration never fails eagerly: problems (duplicate names, arity
//! mismatches, malformed queries) accumulate and are reported as one
//! aggregated misconfiguration when the graph finalizes.

use std::marker::PhantomData;
use std::sync::Arc;

use strata_model::{DataCellIndex, Identifier, ProductEntry, ProductStore, ProductValue, TypeTag};

use crate::bind::{CallableFn, FoldFn};
use crate::catalog::{
	FoldSpec, ObserverSpec, OutputSpec, PredicateSpec, ProviderSpec, TransformSpec, UnfoldSpec,
};
use crate::config::Concurrency;
use crate::graph::FrameworkGraph;
use crate::node::catch_user;
use crate::node::fold::TypedFoldRunner;
use crate::node::unfold::{TypedUnfoldRunner, UnfoldObject};
use crate::query::ProductQuery;

impl FrameworkGraph {
	/// Declares a provider: one product per routed index of its layer.
	pub fn provide<F, T>(
		&mut self,
		name: &str,
		f: F,
		concurrency: Concurrency,
	) -> ProviderBuilder<'_, F, T>
	where
		F: Fn(&DataCellIndex) -> T + Send + Sync + 'static,
		T: ProductValue,
	{
		ProviderBuilder {
			graph: self,
			name: name.to_owned(),
			concurrency,
			f,
			_output: PhantomData,
		}
	}

	/// Declares a transform: consumes a matched input family, produces one
	/// new product.
	pub fn transform<F, Args>(
		&mut self,
		name: &str,
		f: F,
		concurrency: Concurrency,
	) -> TransformBuilder<'_, F, Args>
	where
		F: CallableFn<Args>,
		F::Output: ProductValue,
	{
		TransformBuilder {
			graph: self,
			name: name.to_owned(),
			concurrency,
			f,
			_args: PhantomData,
		}
	}

	/// Declares an observer: consumes a matched input family, produces
	/// nothing.
	pub fn observe<F, Args>(
		&mut self,
		name: &str,
		f: F,
		concurrency: Concurrency,
	) -> ObserverBuilder<'_, F, Args>
	where
		F: CallableFn<Args, Output = ()>,
	{
		ObserverBuilder {
			graph: self,
			name: name.to_owned(),
			concurrency,
			f,
			_args: PhantomData,
		}
	}

	/// Declares a predicate: decides true or false per message id.
	pub fn predicate<F, Args>(
		&mut self,
		name: &str,
		f: F,
		concurrency: Concurrency,
	) -> PredicateBuilder<'_, F, Args>
	where
		F: CallableFn<Args, Output = bool>,
	{
		PredicateBuilder {
			graph: self,
			name: name.to_owned(),
			concurrency,
			f,
			_args: PhantomData,
		}
	}

	/// Declares a fold aggregating inputs within each `partition` scope,
	/// starting every partition from a clone of `init`.
	pub fn fold<Acc, F, Args>(
		&mut self,
		name: &str,
		f: F,
		concurrency: Concurrency,
		partition: &str,
		init: Acc,
	) -> FoldBuilder<'_, Acc, F, Args>
	where
		Acc: ProductValue + Clone,
		F: FoldFn<Acc, Args>,
		Args: 'static,
	{
		FoldBuilder {
			graph: self,
			name: name.to_owned(),
			concurrency,
			partition: Identifier::new(partition),
			init,
			f,
			_args: PhantomData,
		}
	}

	/// Declares an unfold expanding each parent cell into children at
	/// `child_layer`.
	///
	/// `ctor` builds the algorithm object from the parent's inputs;
	/// iteration starts from the object's initial value and continues while
	/// `predicate` holds, with `step` producing the next value and one child
	/// product per turn.
	pub fn unfold<C, Args, P, U, Prod>(
		&mut self,
		name: &str,
		ctor: C,
		predicate: P,
		step: U,
		concurrency: Concurrency,
		child_layer: &str,
	) -> UnfoldBuilder<'_, C, Args, P, U, Prod>
	where
		C: CallableFn<Args>,
		C::Output: UnfoldObject,
		P: Fn(&C::Output, &<C::Output as UnfoldObject>::Value) -> bool + Send + Sync + 'static,
		U: Fn(
				&C::Output,
				<C::Output as UnfoldObject>::Value,
			) -> (<C::Output as UnfoldObject>::Value, Prod)
			+ Send
			+ Sync
			+ 'static,
		Prod: ProductValue,
		Args: 'static,
	{
		UnfoldBuilder {
			graph: self,
			name: name.to_owned(),
			concurrency,
			child_layer: Identifier::new(child_layer),
			ctor,
			predicate,
			step,
			_marker: PhantomData,
		}
	}

	/// Declares an output sink receiving every published store.
	pub fn output<F>(&mut self, name: &str, f: F, concurrency: Concurrency)
	where
		F: Fn(&ProductStore) + Send + Sync + 'static,
	{
		let calls = self.register_node_name(name);
		let node = name.to_owned();
		let runner = Arc::new(move |store: &strata_model::StoreRef| {
			catch_user(&node, || f(store))
		});
		self.catalog_mut().outputs.push(OutputSpec {
			name: name.to_owned(),
			concurrency,
			runner,
			calls,
		});
	}
}

pub struct ProviderBuilder<'g, F, T> {
	graph: &'g mut FrameworkGraph,
	name: String,
	concurrency: Concurrency,
	f: F,
	_output: PhantomData<fn() -> T>,
}

impl<F, T> ProviderBuilder<'_, F, T>
where
	F: Fn(&DataCellIndex) -> T + Send + Sync + 'static,
	T: ProductValue,
{
	pub fn output_product(self, mut query: ProductQuery) {
		let calls = self.graph.register_node_name(&self.name);
		query.set_tag(TypeTag::of::<T>());
		let product_name = query
			.suffix_name()
			.cloned()
			.unwrap_or_else(|| Identifier::new(""));

		let node = self.name.clone();
		let f = self.f;
		let runner = Arc::new(move |index: &strata_model::IndexRef| {
			catch_user(&node, || f(index)).map(ProductEntry::new)
		});

		self.graph.catalog_mut().providers.push(ProviderSpec {
			name: self.name,
			concurrency: self.concurrency,
			query,
			product_name,
			runner,
			calls,
		});
	}
}

pub struct TransformBuilder<'g, F, Args> {
	graph: &'g mut FrameworkGraph,
	name: String,
	concurrency: Concurrency,
	f: F,
	_args: PhantomData<fn() -> Args>,
}

impl<'g, F, Args> TransformBuilder<'g, F, Args>
where
	F: CallableFn<Args>,
	F::Output: ProductValue,
	Args: 'static,
{
	pub fn input_family(
		self,
		queries: impl IntoIterator<Item = ProductQuery>,
	) -> OutputsBuilder<'g> {
		let calls = self.graph.register_node_name(&self.name);
		let queries = prepare_queries::<F, Args>(self.graph, &self.name, queries);
		let shared: Arc<[ProductQuery]> = queries.clone().into();

		let node = self.name.clone();
		let f = self.f;
		let runner = Arc::new(move |messages: &[crate::message::Message]| {
			catch_user(&node, || f.invoke(messages, &shared))
				.and_then(|result| result)
				.map(ProductEntry::new)
		});

		self.graph.catalog_mut().transforms.push(TransformSpec {
			name: self.name.clone(),
			concurrency: self.concurrency,
			inputs: queries,
			output_name: None,
			output_tag: TypeTag::of::<F::Output>(),
			runner,
			predicates: Vec::new(),
			calls,
		});
		OutputsBuilder {
			graph: self.graph,
			name: self.name,
		}
	}
}

pub struct ObserverBuilder<'g, F, Args> {
	graph: &'g mut FrameworkGraph,
	name: String,
	concurrency: Concurrency,
	f: F,
	_args: PhantomData<fn() -> Args>,
}

impl<'g, F, Args> ObserverBuilder<'g, F, Args>
where
	F: CallableFn<Args, Output = ()>,
	Args: 'static,
{
	pub fn input_family(self, queries: impl IntoIterator<Item = ProductQuery>) -> WhenBuilder<'g> {
		let calls = self.graph.register_node_name(&self.name);
		let queries = prepare_queries::<F, Args>(self.graph, &self.name, queries);
		let shared: Arc<[ProductQuery]> = queries.clone().into();

		let node = self.name.clone();
		let f = self.f;
		let runner = Arc::new(move |messages: &[crate::message::Message]| {
			catch_user(&node, || f.invoke(messages, &shared)).and_then(|result| result)
		});

		self.graph.catalog_mut().observers.push(ObserverSpec {
			name: self.name.clone(),
			concurrency: self.concurrency,
			inputs: queries,
			runner,
			predicates: Vec::new(),
			calls,
		});
		WhenBuilder {
			graph: self.graph,
			name: self.name,
		}
	}
}

pub struct PredicateBuilder<'g, F, Args> {
	graph: &'g mut FrameworkGraph,
	name: String,
	concurrency: Concurrency,
	f: F,
	_args: PhantomData<fn() -> Args>,
}

impl<'g, F, Args> PredicateBuilder<'g, F, Args>
where
	F: CallableFn<Args, Output = bool>,
	Args: 'static,
{
	pub fn input_family(self, queries: impl IntoIterator<Item = ProductQuery>) -> WhenBuilder<'g> {
		let calls = self.graph.register_node_name(&self.name);
		let queries = prepare_queries::<F, Args>(self.graph, &self.name, queries);
		let shared: Arc<[ProductQuery]> = queries.clone().into();

		let node = self.name.clone();
		let f = self.f;
		let runner = Arc::new(move |messages: &[crate::message::Message]| {
			catch_user(&node, || f.invoke(messages, &shared)).and_then(|result| result)
		});

		self.graph.catalog_mut().predicates.push(PredicateSpec {
			name: self.name.clone(),
			concurrency: self.concurrency,
			inputs: queries,
			runner,
			predicates: Vec::new(),
			calls,
		});
		WhenBuilder {
			graph: self.graph,
			name: self.name,
		}
	}
}

pub struct FoldBuilder<'g, Acc, F, Args> {
	graph: &'g mut FrameworkGraph,
	name: String,
	concurrency: Concurrency,
	partition: Identifier,
	init: Acc,
	f: F,
	_args: PhantomData<fn() -> Args>,
}

impl<'g, Acc, F, Args> FoldBuilder<'g, Acc, F, Args>
where
	Acc: ProductValue + Clone,
	F: FoldFn<Acc, Args>,
	Args: 'static,
{
	pub fn input_family(
		self,
		queries: impl IntoIterator<Item = ProductQuery>,
	) -> OutputsBuilder<'g> {
		let calls = self.graph.register_node_name(&self.name);
		let mut queries: Vec<ProductQuery> = queries.into_iter().collect();
		if queries.len() != F::ARITY {
			self.graph.report(format!(
				"{}: {} input queries for a function of {} arguments",
				self.name,
				queries.len(),
				F::ARITY
			));
		}
		for (query, tag) in queries.iter_mut().zip(F::input_tags()) {
			query.set_tag(tag);
		}
		let shared: Arc<[ProductQuery]> = queries.clone().into();

		let runner = Arc::new(TypedFoldRunner::new(
			self.name.clone(),
			self.init,
			self.f,
			shared,
		));

		self.graph.catalog_mut().folds.push(FoldSpec {
			name: self.name.clone(),
			concurrency: self.concurrency,
			partition: self.partition,
			inputs: queries,
			output_name: None,
			output_tag: TypeTag::of::<Acc>(),
			runner,
			predicates: Vec::new(),
			calls,
		});
		OutputsBuilder {
			graph: self.graph,
			name: self.name,
		}
	}
}

pub struct UnfoldBuilder<'g, C, Args, P, U, Prod> {
	graph: &'g mut FrameworkGraph,
	name: String,
	concurrency: Concurrency,
	child_layer: Identifier,
	ctor: C,
	predicate: P,
	step: U,
	_marker: PhantomData<fn() -> (Args, Prod)>,
}

impl<'g, C, Args, P, U, Prod> UnfoldBuilder<'g, C, Args, P, U, Prod>
where
	C: CallableFn<Args>,
	C::Output: UnfoldObject,
	P: Fn(&C::Output, &<C::Output as UnfoldObject>::Value) -> bool + Send + Sync + 'static,
	U: Fn(
			&C::Output,
			<C::Output as UnfoldObject>::Value,
		) -> (<C::Output as UnfoldObject>::Value, Prod)
		+ Send
		+ Sync
		+ 'static,
	Prod: ProductValue,
	Args: 'static,
{
	pub fn input_family(
		self,
		queries: impl IntoIterator<Item = ProductQuery>,
	) -> OutputsBuilder<'g> {
		let calls = self.graph.register_node_name(&self.name);
		let queries = prepare_queries::<C, Args>(self.graph, &self.name, queries);
		let shared: Arc<[ProductQuery]> = queries.clone().into();

		let runner = Arc::new(TypedUnfoldRunner::new(
			self.name.clone(),
			self.ctor,
			self.predicate,
			self.step,
			shared,
		));

		self.graph.catalog_mut().unfolds.push(UnfoldSpec {
			name: self.name.clone(),
			concurrency: self.concurrency,
			child_layer: self.child_layer,
			inputs: queries,
			output_name: None,
			output_tag: TypeTag::of::<Prod>(),
			runner,
			predicates: Vec::new(),
			calls,
		});
		OutputsBuilder {
			graph: self.graph,
			name: self.name,
		}
	}
}

/// Second registration stage for producers: name the output products.
pub struct OutputsBuilder<'g> {
	graph: &'g mut FrameworkGraph,
	name: String,
}

impl<'g> OutputsBuilder<'g> {
	pub fn output_products(self, names: &[&str]) -> WhenBuilder<'g> {
		match names {
			[only] => {
				self.graph
					.catalog_mut()
					.set_output_name(&self.name, Identifier::new(*only));
			}
			_ => {
				let node = self.name.clone();
				self.graph.report(format!(
					"{node}: exactly one output product must be declared, got {}",
					names.len()
				));
			}
		}
		WhenBuilder {
			graph: self.graph,
			name: self.name,
		}
	}
}

/// Final registration stage: optional predicate gating.
pub struct WhenBuilder<'g> {
	graph: &'g mut FrameworkGraph,
	name: String,
}

impl WhenBuilder<'_> {
	pub fn when(self, predicates: &[&str]) -> Self {
		let mut names = predicates.iter().map(|p| (*p).to_owned());
		if !self.graph.catalog_mut().add_predicates(&self.name, &mut names) {
			let node = self.name.clone();
			self.graph
				.report(format!("{node}: cannot attach predicates to this node"));
		}
		self
	}
}

fn prepare_queries<F, Args>(
	graph: &mut FrameworkGraph,
	node: &str,
	queries: impl IntoIterator<Item = ProductQuery>,
) -> Vec<ProductQuery>
where
	F: CallableFn<Args>,
{
	let mut queries: Vec<ProductQuery> = queries.into_iter().collect();
	if queries.len() != F::ARITY {
		graph.report(format!(
			"{node}: {} input queries for a function of {} arguments",
			queries.len(),
			F::ARITY
		));
	}
	for (query, tag) in queries.iter_mut().zip(F::input_tags()) {
		query.set_tag(tag);
	}
	queries
}
