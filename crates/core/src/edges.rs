//! Finalize: turn the registered node catalog into a wired actor plan.
//!
//! Producers are matched to consumer queries by product name and creator
//! identifier with an exact-type check; queries no algorithm satisfies
//! become provider head-ports; whatever remains unmatched is a
//! misconfiguration. All registration problems are reported in one
//! aggregated error before anything runs.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use rustc_hash::FxHashMap;
use smallvec::smallvec;
use strata_model::Identifier;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

use crate::catalog::{NodeCatalog, PredicateSpec};
use crate::config::RunConfig;
use crate::error::Error;
use crate::gate::{GateState, run_gate};
use crate::hierarchy::DataLayerHierarchy;
use crate::join::run_join;
use crate::message::{IndexMessage, InputSet, Message};
use crate::node::fold::FoldNode;
use crate::node::observer::ObserverNode;
use crate::node::output::OutputNode;
use crate::node::predicate::PredicateNode;
use crate::node::provider::ProviderNode;
use crate::node::transform::TransformNode;
use crate::node::unfold::UnfoldNode;
use crate::node::{RunState, consume};
use crate::ports::{
	Flusher, FoldEvent, GateEvent, PortFn, RepeaterEvent, SetFn, gate_port, join_port,
	repeater_port, set_into_consumer, set_into_fold,
};
use crate::query::ProductQuery;
use crate::repeater::{RepeaterState, run_repeater};
use crate::router::{IndexRouter, NamedIndexPort, ProviderPort};
use crate::store_counters::CountStores;

pub(crate) type ActorFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub(crate) struct Plan {
	pub actors: Vec<ActorFuture>,
	pub router: IndexRouter,
}

/// The input-side wiring of one consumer: what producers send into, and the
/// repeater ports the router addresses.
struct Front {
	ports: Vec<PortFn>,
	index_ports: Vec<NamedIndexPort>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum ProducerId {
	Transform(usize),
	Fold(usize),
	Unfold(usize),
}

struct ProducerEntry {
	id: ProducerId,
	creator: Identifier,
	tag: strata_model::TypeTag,
}

struct HeadPort {
	consumer: String,
	query: ProductQuery,
	port: PortFn,
}

#[allow(clippy::too_many_arguments)]
fn build_front(
	name: &str,
	inputs: &[ProductQuery],
	gating: &[String],
	out: SetFn,
	predicates: &[PredicateSpec],
	actors: &mut Vec<ActorFuture>,
	gate_subscriptions: &mut FxHashMap<String, Vec<UnboundedSender<GateEvent>>>,
	errors: &mut Vec<String>,
) -> Front {
	let arity = inputs.len();
	let mut index_ports = Vec::new();

	let mut ports: Vec<PortFn> = if arity <= 1 {
		let out = Arc::clone(&out);
		let port: PortFn = Arc::new(move |message: Message| out(smallvec![message]));
		vec![port]
	} else {
		let (join_tx, join_rx) = mpsc::unbounded_channel();
		actors.push(Box::pin(run_join(join_rx, arity, out)));

		let distinct: HashSet<&Identifier> = inputs.iter().map(|q| q.layer_name()).collect();
		if distinct.len() > 1 {
			// Inputs cross layer boundaries: one repeater per slot so the
			// coarse products repeat for every fine-layer id.
			let mut repeater_ports = Vec::with_capacity(arity);
			for (slot, query) in inputs.iter().enumerate() {
				let (repeater_tx, repeater_rx) = mpsc::unbounded_channel::<RepeaterEvent>();
				let state = RepeaterState::new(
					name.to_owned(),
					query.layer_name().clone(),
					join_port(&join_tx, slot),
				);
				actors.push(Box::pin(run_repeater(repeater_rx, state)));
				index_ports.push(NamedIndexPort {
					layer: query.layer_name().clone(),
					tx: repeater_tx.clone(),
				});
				repeater_ports.push(repeater_port(&repeater_tx));
			}
			repeater_ports
		} else {
			(0..arity).map(|slot| join_port(&join_tx, slot)).collect()
		}
	};

	if !gating.is_empty() {
		let (gate_tx, gate_rx) = mpsc::unbounded_channel();
		for predicate in gating {
			if !predicates.iter().any(|spec| spec.name == *predicate) {
				errors.push(format!(
					"a non-existent predicate '{predicate}' was specified for {name}"
				));
				continue;
			}
			gate_subscriptions
				.entry(predicate.clone())
				.or_default()
				.push(gate_tx.clone());
		}
		let gate = GateState::new(
			name.to_owned(),
			gating.len(),
			inputs.to_vec(),
			std::mem::take(&mut ports),
		);
		actors.push(Box::pin(run_gate(gate_rx, gate)));
		ports = (0..arity.max(1)).map(|_| gate_port(&gate_tx)).collect();
	}

	Front { ports, index_ports }
}

fn resolve_inputs(
	name: &str,
	inputs: &[ProductQuery],
	front: &Front,
	producer_index: &FxHashMap<Identifier, Vec<ProducerEntry>>,
	producer_outputs: &mut FxHashMap<ProducerId, Vec<PortFn>>,
	head_ports: &mut Vec<HeadPort>,
	errors: &mut Vec<String>,
) {
	if front.ports.len() != inputs.len() {
		// An arity mismatch was already reported at registration.
		return;
	}

	for (slot, query) in inputs.iter().enumerate() {
		let Some(suffix) = query.suffix_name() else {
			continue;
		};
		let port = front.ports[slot].clone();

		let Some(entries) = producer_index.get(suffix) else {
			// No algorithm makes this product; assume it comes from a
			// provider.
			head_ports.push(HeadPort {
				consumer: name.to_owned(),
				query: query.clone(),
				port,
			});
			continue;
		};

		let mut candidates: Vec<&ProducerEntry> = Vec::new();
		for entry in entries {
			if entry.creator != *query.creator_name() {
				debug!(query = %query, producer = %entry.creator, "creator name mismatch");
				continue;
			}
			if let Some(tag) = query.tag() {
				if tag != entry.tag {
					debug!(
						query = %query,
						producer = %entry.creator,
						produced = %entry.tag,
						"types don't match, excluding from candidates"
					);
					continue;
				}
			}
			candidates.push(entry);
		}

		match candidates.as_slice() {
			[] => errors.push(format!(
				"{name}: cannot identify a product matching the query {query}"
			)),
			[only] => {
				trace!(consumer = %name, query = %query, "connecting producer");
				producer_outputs.entry(only.id).or_default().push(port);
			}
			_ => errors.push(format!(
				"{name}: more than one producer matches the query {query}"
			)),
		}
	}
}

pub(crate) fn finalize(
	catalog: NodeCatalog,
	mut errors: Vec<String>,
	config: &RunConfig,
	hierarchy: Arc<DataLayerHierarchy>,
	state: RunState,
) -> Result<Plan, Error> {
	let NodeCatalog {
		providers,
		transforms,
		observers,
		predicates,
		folds,
		unfolds,
		outputs,
	} = catalog;

	// ------------------------------------------------------------------
	// Registration validation.
	for spec in &providers {
		spec.query.validate(&spec.name, &mut errors);
	}
	for spec in &transforms {
		for query in &spec.inputs {
			query.validate(&spec.name, &mut errors);
		}
		if spec.output_name.is_none() {
			errors.push(format!("{}: no output products declared", spec.name));
		}
	}
	for spec in &observers {
		for query in &spec.inputs {
			query.validate(&spec.name, &mut errors);
		}
	}
	for spec in &predicates {
		for query in &spec.inputs {
			query.validate(&spec.name, &mut errors);
		}
	}
	for spec in &folds {
		for query in &spec.inputs {
			query.validate(&spec.name, &mut errors);
		}
		if spec.output_name.is_none() {
			errors.push(format!("{}: no output products declared", spec.name));
		}
		if spec.partition.is_empty() {
			errors.push(format!("{}: fold partition must be a layer name", spec.name));
		}
	}
	for spec in &unfolds {
		for query in &spec.inputs {
			query.validate(&spec.name, &mut errors);
		}
		if spec.output_name.is_none() {
			errors.push(format!("{}: no output products declared", spec.name));
		}
		if spec.child_layer.is_empty() {
			errors.push(format!("{}: unfold child layer must be named", spec.name));
		}
	}

	// ------------------------------------------------------------------
	// Input fronts: channels, joins, repeaters, gates.
	let mut actors: Vec<ActorFuture> = Vec::new();
	let mut gate_subscriptions: FxHashMap<String, Vec<UnboundedSender<GateEvent>>> =
		FxHashMap::default();
	let mut multilayers: Vec<(String, Vec<NamedIndexPort>)> = Vec::new();

	let collect_front = |front: &mut Front, name: &str, multilayers: &mut Vec<_>| {
		if !front.index_ports.is_empty() {
			multilayers.push((name.to_owned(), std::mem::take(&mut front.index_ports)));
		}
	};

	let mut transform_rxs: Vec<UnboundedReceiver<InputSet>> = Vec::new();
	let mut transform_fronts: Vec<Front> = Vec::new();
	for spec in &transforms {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut front = build_front(
			&spec.name,
			&spec.inputs,
			&spec.predicates,
			set_into_consumer(&tx),
			&predicates,
			&mut actors,
			&mut gate_subscriptions,
			&mut errors,
		);
		collect_front(&mut front, &spec.name, &mut multilayers);
		transform_rxs.push(rx);
		transform_fronts.push(front);
	}

	let mut observer_rxs: Vec<UnboundedReceiver<InputSet>> = Vec::new();
	let mut observer_fronts: Vec<Front> = Vec::new();
	for spec in &observers {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut front = build_front(
			&spec.name,
			&spec.inputs,
			&spec.predicates,
			set_into_consumer(&tx),
			&predicates,
			&mut actors,
			&mut gate_subscriptions,
			&mut errors,
		);
		collect_front(&mut front, &spec.name, &mut multilayers);
		observer_rxs.push(rx);
		observer_fronts.push(front);
	}

	let mut predicate_rxs: Vec<UnboundedReceiver<InputSet>> = Vec::new();
	let mut predicate_fronts: Vec<Front> = Vec::new();
	for spec in &predicates {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut front = build_front(
			&spec.name,
			&spec.inputs,
			&spec.predicates,
			set_into_consumer(&tx),
			&predicates,
			&mut actors,
			&mut gate_subscriptions,
			&mut errors,
		);
		collect_front(&mut front, &spec.name, &mut multilayers);
		predicate_rxs.push(rx);
		predicate_fronts.push(front);
	}

	let mut fold_rxs: Vec<UnboundedReceiver<FoldEvent>> = Vec::new();
	let mut fold_txs: Vec<UnboundedSender<FoldEvent>> = Vec::new();
	let mut fold_fronts: Vec<Front> = Vec::new();
	for spec in &folds {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut front = build_front(
			&spec.name,
			&spec.inputs,
			&spec.predicates,
			set_into_fold(&tx),
			&predicates,
			&mut actors,
			&mut gate_subscriptions,
			&mut errors,
		);
		collect_front(&mut front, &spec.name, &mut multilayers);
		fold_rxs.push(rx);
		fold_txs.push(tx);
		fold_fronts.push(front);
	}

	let mut unfold_rxs: Vec<UnboundedReceiver<InputSet>> = Vec::new();
	let mut unfold_fronts: Vec<Front> = Vec::new();
	for spec in &unfolds {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut front = build_front(
			&spec.name,
			&spec.inputs,
			&spec.predicates,
			set_into_consumer(&tx),
			&predicates,
			&mut actors,
			&mut gate_subscriptions,
			&mut errors,
		);
		collect_front(&mut front, &spec.name, &mut multilayers);
		unfold_rxs.push(rx);
		unfold_fronts.push(front);
	}

	// ------------------------------------------------------------------
	// Producer lookup table, then edge resolution.
	let mut producer_index: FxHashMap<Identifier, Vec<ProducerEntry>> = FxHashMap::default();
	for (i, spec) in transforms.iter().enumerate() {
		if let Some(output) = &spec.output_name {
			producer_index
				.entry(output.clone())
				.or_default()
				.push(ProducerEntry {
					id: ProducerId::Transform(i),
					creator: Identifier::new(&spec.name),
					tag: spec.output_tag,
				});
		}
	}
	for (i, spec) in folds.iter().enumerate() {
		if let Some(output) = &spec.output_name {
			producer_index
				.entry(output.clone())
				.or_default()
				.push(ProducerEntry {
					id: ProducerId::Fold(i),
					creator: Identifier::new(&spec.name),
					tag: spec.output_tag,
				});
		}
	}
	for (i, spec) in unfolds.iter().enumerate() {
		if let Some(output) = &spec.output_name {
			producer_index
				.entry(output.clone())
				.or_default()
				.push(ProducerEntry {
					id: ProducerId::Unfold(i),
					creator: Identifier::new(&spec.name),
					tag: spec.output_tag,
				});
		}
	}

	let mut producer_outputs: FxHashMap<ProducerId, Vec<PortFn>> = FxHashMap::default();
	let mut head_ports: Vec<HeadPort> = Vec::new();

	for (spec, front) in transforms.iter().zip(&transform_fronts) {
		resolve_inputs(
			&spec.name,
			&spec.inputs,
			front,
			&producer_index,
			&mut producer_outputs,
			&mut head_ports,
			&mut errors,
		);
	}
	for (spec, front) in observers.iter().zip(&observer_fronts) {
		resolve_inputs(
			&spec.name,
			&spec.inputs,
			front,
			&producer_index,
			&mut producer_outputs,
			&mut head_ports,
			&mut errors,
		);
	}
	for (spec, front) in predicates.iter().zip(&predicate_fronts) {
		resolve_inputs(
			&spec.name,
			&spec.inputs,
			front,
			&producer_index,
			&mut producer_outputs,
			&mut head_ports,
			&mut errors,
		);
	}
	for (spec, front) in folds.iter().zip(&fold_fronts) {
		resolve_inputs(
			&spec.name,
			&spec.inputs,
			front,
			&producer_index,
			&mut producer_outputs,
			&mut head_ports,
			&mut errors,
		);
	}
	for (spec, front) in unfolds.iter().zip(&unfold_fronts) {
		resolve_inputs(
			&spec.name,
			&spec.inputs,
			front,
			&producer_index,
			&mut producer_outputs,
			&mut head_ports,
			&mut errors,
		);
	}

	// ------------------------------------------------------------------
	// Provider edges: match remaining head ports against declared providers.
	let mut provider_txs: Vec<Option<UnboundedSender<IndexMessage>>> =
		vec![None; providers.len()];
	let mut provider_rxs: Vec<Option<UnboundedReceiver<IndexMessage>>> =
		(0..providers.len()).map(|_| None).collect();
	let mut provider_outputs: Vec<Vec<PortFn>> = vec![Vec::new(); providers.len()];
	let mut provider_ports: Vec<ProviderPort> = Vec::new();

	for head in head_ports {
		let matched = providers
			.iter()
			.position(|provider| head.query.accepts(&provider.query));
		match matched {
			Some(i) => {
				if provider_txs[i].is_none() {
					let (tx, rx) = mpsc::unbounded_channel();
					provider_ports.push(ProviderPort {
						query: providers[i].query.clone(),
						tx: tx.clone(),
					});
					provider_txs[i] = Some(tx);
					provider_rxs[i] = Some(rx);
				}
				debug!(
					provider = %providers[i].name,
					consumer = %head.consumer,
					product = %head.query,
					"connecting provider"
				);
				provider_outputs[i].push(head.port);
			}
			None => errors.push(format!(
				"no provider found for product {} required by {}",
				head.query, head.consumer
			)),
		}
	}

	// ------------------------------------------------------------------
	// Output sinks observe everything providers and producers publish.
	let mut output_rxs: Vec<UnboundedReceiver<Message>> = Vec::new();
	let mut output_ports: Vec<PortFn> = Vec::new();
	for _spec in &outputs {
		let (tx, rx) = mpsc::unbounded_channel();
		output_rxs.push(rx);
		output_ports.push(Arc::new(move |message| {
			let _ = tx.send(message);
		}));
	}
	if !output_ports.is_empty() {
		for ports in provider_outputs.iter_mut() {
			ports.extend(output_ports.iter().cloned());
		}
		for i in 0..transforms.len() {
			producer_outputs
				.entry(ProducerId::Transform(i))
				.or_default()
				.extend(output_ports.iter().cloned());
		}
		for i in 0..folds.len() {
			producer_outputs
				.entry(ProducerId::Fold(i))
				.or_default()
				.extend(output_ports.iter().cloned());
		}
		for i in 0..unfolds.len() {
			producer_outputs
				.entry(ProducerId::Unfold(i))
				.or_default()
				.extend(output_ports.iter().cloned());
		}
	}

	// ------------------------------------------------------------------
	// Flush wiring: folds over an unfold's child layer listen to that
	// unfold; everything else listens to the router.
	let mut router_flusher = Flusher::default();
	let mut unfold_flushers: Vec<Flusher> = (0..unfolds.len()).map(|_| Flusher::default()).collect();
	let mut unfold_by_layer: FxHashMap<Identifier, usize> = FxHashMap::default();
	for (i, spec) in unfolds.iter().enumerate() {
		unfold_by_layer.entry(spec.child_layer.clone()).or_insert(i);
	}

	for (spec, tx) in folds.iter().zip(&fold_txs) {
		let mut to_router = false;
		let mut to_unfolds: HashSet<usize> = HashSet::new();
		for query in &spec.inputs {
			match unfold_by_layer.get(query.layer_name()) {
				Some(&unfold_id) => {
					to_unfolds.insert(unfold_id);
				}
				None => to_router = true,
			}
		}
		if to_router {
			router_flusher.subscribe(tx.clone());
		}
		for unfold_id in to_unfolds {
			unfold_flushers[unfold_id].subscribe(tx.clone());
		}
	}

	if !errors.is_empty() {
		return Err(Error::misconfiguration(&errors));
	}

	// ------------------------------------------------------------------
	// Node actors.
	for ((i, spec), rx) in transforms.into_iter().enumerate().zip(transform_rxs) {
		let Some(output_name) = spec.output_name else {
			continue;
		};
		let node = Arc::new(TransformNode {
			name: Identifier::new(&spec.name),
			output_name,
			runner: spec.runner,
			outputs: producer_outputs
				.remove(&ProducerId::Transform(i))
				.unwrap_or_default(),
			calls: spec.calls,
		});
		let concurrency = config.concurrency_for(&spec.name, spec.concurrency);
		let node_state = state.clone();
		actors.push(Box::pin(consume(
			rx,
			concurrency,
			state.clone(),
			move |set| node.process(set, &node_state),
		)));
	}

	for (spec, rx) in observers.into_iter().zip(observer_rxs) {
		let node = Arc::new(ObserverNode {
			runner: spec.runner,
			calls: spec.calls,
		});
		let concurrency = config.concurrency_for(&spec.name, spec.concurrency);
		let node_state = state.clone();
		actors.push(Box::pin(consume(
			rx,
			concurrency,
			state.clone(),
			move |set| node.process(set, &node_state),
		)));
	}

	for (spec, rx) in predicates.into_iter().zip(predicate_rxs) {
		let node = Arc::new(PredicateNode {
			runner: spec.runner,
			subscribers: gate_subscriptions.remove(&spec.name).unwrap_or_default(),
			calls: spec.calls,
		});
		let concurrency = config.concurrency_for(&spec.name, spec.concurrency);
		let node_state = state.clone();
		actors.push(Box::pin(consume(
			rx,
			concurrency,
			state.clone(),
			move |set| node.process(set, &node_state),
		)));
	}

	for ((i, spec), rx) in folds.into_iter().enumerate().zip(fold_rxs) {
		let Some(output_name) = spec.output_name else {
			continue;
		};
		let node = Arc::new(FoldNode {
			name: Identifier::new(&spec.name),
			partition: spec.partition,
			output_name,
			runner: spec.runner,
			counters: CountStores::default(),
			outputs: producer_outputs
				.remove(&ProducerId::Fold(i))
				.unwrap_or_default(),
			calls: spec.calls,
		});
		let concurrency = config.concurrency_for(&spec.name, spec.concurrency);
		let node_state = state.clone();
		actors.push(Box::pin(consume(
			rx,
			concurrency,
			state.clone(),
			move |event| node.process(event, &node_state),
		)));
	}

	for (((i, spec), rx), flusher) in unfolds
		.into_iter()
		.enumerate()
		.zip(unfold_rxs)
		.zip(unfold_flushers)
	{
		let Some(output_name) = spec.output_name else {
			continue;
		};
		let node = Arc::new(UnfoldNode {
			name: Identifier::new(&spec.name),
			child_layer: spec.child_layer,
			output_name,
			runner: spec.runner,
			outputs: producer_outputs
				.remove(&ProducerId::Unfold(i))
				.unwrap_or_default(),
			flusher,
			msg_counter: AtomicU64::new(0),
			calls: spec.calls,
			hierarchy: Arc::clone(&hierarchy),
		});
		let concurrency = config.concurrency_for(&spec.name, spec.concurrency);
		let node_state = state.clone();
		actors.push(Box::pin(consume(
			rx,
			concurrency,
			state.clone(),
			move |set| node.process(set, &node_state),
		)));
	}

	for (spec, rx) in outputs.into_iter().zip(output_rxs) {
		let node = Arc::new(OutputNode {
			runner: spec.runner,
			calls: spec.calls,
		});
		let concurrency = config.concurrency_for(&spec.name, spec.concurrency);
		let node_state = state.clone();
		actors.push(Box::pin(consume(
			rx,
			concurrency,
			state.clone(),
			move |message| node.process(message, &node_state),
		)));
	}

	for ((i, spec), rx) in providers.into_iter().enumerate().zip(provider_rxs) {
		// Providers nothing consumes from are never invoked.
		let Some(rx) = rx else {
			continue;
		};
		let node = Arc::new(ProviderNode {
			name: Identifier::new(&spec.name),
			product_name: spec.product_name,
			runner: spec.runner,
			outputs: std::mem::take(&mut provider_outputs[i]),
			calls: spec.calls,
		});
		let concurrency = config.concurrency_for(&spec.name, spec.concurrency);
		let node_state = state.clone();
		actors.push(Box::pin(consume(
			rx,
			concurrency,
			state.clone(),
			move |message| node.process(message, &node_state),
		)));
	}

	let router = IndexRouter::new(provider_ports, multilayers, router_flusher);
	Ok(Plan { actors, router })
}
