//! The registry of declared nodes, filled during registration and consumed
//! at finalize.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use strata_model::{Identifier, TypeTag};

use crate::config::Concurrency;
use crate::node::fold::FoldRunner;
use crate::node::observer::ObserverRunner;
use crate::node::output::OutputRunner;
use crate::node::predicate::PredicateRunner;
use crate::node::provider::ProviderRunner;
use crate::node::transform::TransformRunner;
use crate::node::unfold::UnfoldRunner;
use crate::query::ProductQuery;

pub(crate) struct ProviderSpec {
	pub name: String,
	pub concurrency: Concurrency,
	pub query: ProductQuery,
	pub product_name: Identifier,
	pub runner: ProviderRunner,
	pub calls: Arc<AtomicUsize>,
}

pub(crate) struct TransformSpec {
	pub name: String,
	pub concurrency: Concurrency,
	pub inputs: Vec<ProductQuery>,
	pub output_name: Option<Identifier>,
	pub output_tag: TypeTag,
	pub runner: TransformRunner,
	pub predicates: Vec<String>,
	pub calls: Arc<AtomicUsize>,
}

pub(crate) struct ObserverSpec {
	pub name: String,
	pub concurrency: Concurrency,
	pub inputs: Vec<ProductQuery>,
	pub runner: ObserverRunner,
	pub predicates: Vec<String>,
	pub calls: Arc<AtomicUsize>,
}

pub(crate) struct PredicateSpec {
	pub name: String,
	pub concurrency: Concurrency,
	pub inputs: Vec<ProductQuery>,
	pub runner: PredicateRunner,
	pub predicates: Vec<String>,
	pub calls: Arc<AtomicUsize>,
}

pub(crate) struct FoldSpec {
	pub name: String,
	pub concurrency: Concurrency,
	pub partition: Identifier,
	pub inputs: Vec<ProductQuery>,
	pub output_name: Option<Identifier>,
	pub output_tag: TypeTag,
	pub runner: Arc<dyn FoldRunner>,
	pub predicates: Vec<String>,
	pub calls: Arc<AtomicUsize>,
}

pub(crate) struct UnfoldSpec {
	pub name: String,
	pub concurrency: Concurrency,
	pub child_layer: Identifier,
	pub inputs: Vec<ProductQuery>,
	pub output_name: Option<Identifier>,
	pub output_tag: TypeTag,
	pub runner: Arc<dyn UnfoldRunner>,
	pub predicates: Vec<String>,
	pub calls: Arc<AtomicUsize>,
}

pub(crate) struct OutputSpec {
	pub name: String,
	pub concurrency: Concurrency,
	pub runner: OutputRunner,
	pub calls: Arc<AtomicUsize>,
}

#[derive(Default)]
pub(crate) struct NodeCatalog {
	pub providers: Vec<ProviderSpec>,
	pub transforms: Vec<TransformSpec>,
	pub observers: Vec<ObserverSpec>,
	pub predicates: Vec<PredicateSpec>,
	pub folds: Vec<FoldSpec>,
	pub unfolds: Vec<UnfoldSpec>,
	pub outputs: Vec<OutputSpec>,
}

impl NodeCatalog {
	/// Attaches the declared output product name to the named producer.
	pub fn set_output_name(&mut self, node: &str, output: Identifier) -> bool {
		if let Some(spec) = self.transforms.iter_mut().find(|s| s.name == node) {
			spec.output_name = Some(output);
			return true;
		}
		if let Some(spec) = self.folds.iter_mut().find(|s| s.name == node) {
			spec.output_name = Some(output);
			return true;
		}
		if let Some(spec) = self.unfolds.iter_mut().find(|s| s.name == node) {
			spec.output_name = Some(output);
			return true;
		}
		false
	}

	/// Attaches gating predicates to the named consumer.
	pub fn add_predicates(&mut self, node: &str, names: &mut dyn Iterator<Item = String>) -> bool {
		macro_rules! try_kind {
			($field:ident) => {
				if let Some(spec) = self.$field.iter_mut().find(|s| s.name == node) {
					spec.predicates.extend(names);
					return true;
				}
			};
		}
		try_kind!(transforms);
		try_kind!(observers);
		try_kind!(predicates);
		try_kind!(folds);
		try_kind!(unfolds);
		false
	}
}
