//! Module for only DependencyGraph functions not related to the overall resolving process.

use std::collections::{HashMap, HashSet};

use petgraph::prelude::*;

use crate::index::{Dist, PackageRecord, Spec};

/// One node per package name plus a `Meta` node holding the caller's request.
#[derive(Debug, Clone)]
pub(super) struct DependencyGraph {
	pub graph: StableDiGraph<NodeData, Demand>,
	pub meta_node: NodeIndex,
	names: HashMap<String, NodeIndex>,
	next_order: usize,
}

#[derive(Debug, Clone)]
pub(super) struct CandidateData {
	pub dirty: bool,
	pub dist: Dist,
}

#[derive(Debug, Clone)]
pub(super) enum NodeData {
	/// Control node for giving the users requests a presence in the graph.
	Meta,
	/// Node only refers to a name with no package chosen yet.
	Stub(String),
	/// Node contains the package currently chosen for the name.
	Candidate(String, CandidateData),
}

/// A requirement from the source node for the target name to match `spec`.
#[derive(Debug, Clone)]
pub(super) struct Demand {
	pub spec: Spec,
	/// Insertion sequence, used to find the most recent demand when backtracking.
	pub order: usize,
}

impl DependencyGraph {
	pub fn node_name(&self, src: NodeIndex) -> Option<&str> {
		match self.graph.node_weight(src)? {
			NodeData::Stub(name) | NodeData::Candidate(name, _) => Some(name),
			NodeData::Meta => None,
		}
	}

	pub fn chosen_dist(&self, src: NodeIndex) -> Option<&Dist> {
		match self.graph.node_weight(src)? {
			NodeData::Candidate(_, data) => Some(&data.dist),
			NodeData::Stub(_) | NodeData::Meta => None,
		}
	}

	pub fn is_dirty(&self, src: NodeIndex) -> bool {
		match &self.graph[src] {
			NodeData::Stub(_) => true,
			NodeData::Candidate(_, data) => data.dirty,
			NodeData::Meta => false,
		}
	}

	pub fn mark_dirty(&mut self, src: NodeIndex) {
		if let NodeData::Candidate(_, data) = &mut self.graph[src] { data.dirty = true; }
	}

	pub fn node_index(&self, name: &str) -> Option<NodeIndex> {
		self.names.get(name).copied()
	}

	/// Returns the index of the existing node or a new `Stub` node with `name`
	pub fn get_or_add_node_index(&mut self, name: &str) -> NodeIndex {
		if let Some(i) = self.names.get(name) {
			return *i
		}
		let i = self.graph.add_node(NodeData::Stub(name.to_string()));
		self.names.insert(name.to_string(), i);
		i
	}

	/// Adds a demand from `src` on the package named by `spec`, marking the target dirty.
	pub fn add_demand(&mut self, src: NodeIndex, spec: &Spec) {
		let target = self.get_or_add_node_index(spec.name());
		self.mark_dirty(target);
		self.graph.add_edge(src, target, Demand { spec: spec.clone(), order: self.next_order });
		self.next_order += 1;
	}

	/// Demands placed on `src` as `(source, demand)`, oldest first.
	pub fn demands_on(&self, src: NodeIndex) -> Vec<(NodeIndex, &Demand)> {
		let mut demands: Vec<_> = self.graph.edges_directed(src, Incoming)
			.map(|e| (e.source(), e.weight()))
			.collect();
		demands.sort_by_key(|(_, d)| d.order);
		demands
	}

	pub fn dependencies_of(&self, src: NodeIndex) -> Vec<NodeIndex> {
		self.graph.edges_directed(src, Outgoing).map(|e| e.target()).collect()
	}

	/// Makes `dist` the chosen package of `src` and replaces its outgoing demands with the record's dependencies.
	///
	/// Choosing the package already in place only clears the dirty flag, this is what lets cycles settle.
	/// Returns whether the choice changed.
	pub fn set_node_as_package(&mut self, src: NodeIndex, dist: &Dist, record: &PackageRecord) -> bool {
		let name = match &mut self.graph[src] {
			NodeData::Candidate(_, data) if &data.dist == dist => {
				data.dirty = false;
				return false
			},
			NodeData::Candidate(name, _) | NodeData::Stub(name) => name.clone(),
			NodeData::Meta => return false,
		};

		self.clear_nodes_requirements(src);
		for spec in &record.depends {
			self.add_demand(src, spec);
		}
		self.graph[src] = NodeData::Candidate(name, CandidateData { dirty: false, dist: dist.clone() });
		true
	}

	/// Forgets the package chosen for `src`, leaving a `Stub` without outgoing demands.
	pub fn reset_node(&mut self, src: NodeIndex) {
		if let Some(name) = self.node_name(src).map(str::to_string) {
			self.clear_nodes_requirements(src);
			self.graph[src] = NodeData::Stub(name);
		}
	}

	/// Removes all out going demands from `src`, marking every affected node dirty.
	fn clear_nodes_requirements(&mut self, src: NodeIndex) {
		for id in self.graph.edges_directed(src, Outgoing).map(|e| e.id()).collect::<Vec<_>>() {
			if let Some((_, target)) = self.graph.edge_endpoints(id) {
				self.mark_dirty(target);
			}
			self.graph.remove_edge(id);
		}
	}

	/// Removes every node no longer reachable from the meta node.
	///
	/// Their demands go with them so whatever they pointed at is marked dirty.
	pub fn clear_loose_nodes(&mut self) {
		let mut reachable = HashSet::<NodeIndex>::new();
		let mut bfs = Bfs::new(&self.graph, self.meta_node);
		while let Some(i) = bfs.next(&self.graph) {
			reachable.insert(i);
		}

		let loose: Vec<NodeIndex> = self.graph.node_indices().filter(|i| !reachable.contains(i)).collect();
		for i in loose {
			for target in self.dependencies_of(i) {
				self.mark_dirty(target);
			}
			if let Some(name) = self.node_name(i).map(str::to_string) {
				log::trace!("Dropping {} from the resolve, nothing requires it anymore", name);
				self.names.remove(&name);
			}
			self.graph.remove_node(i);
		}
	}

	/// Every chosen package reachable from the meta node, by name.
	pub fn chosen_packages(&self) -> Vec<(NodeIndex, &Dist)> {
		self.graph.node_indices()
			.filter_map(|i| self.chosen_dist(i).map(|d| (i, d)))
			.collect()
	}
}

impl Default for DependencyGraph {
	fn default() -> Self {
		let mut graph = StableDiGraph::<NodeData, Demand>::default();
		let meta_node = graph.add_node(NodeData::Meta);
		Self { graph, meta_node, names: Default::default(), next_order: 0 }
	}
}
