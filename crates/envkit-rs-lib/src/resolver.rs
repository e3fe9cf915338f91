//! Utilities for getting a valid set of compatible packages to be installed from a list of desired specs.
//!
//! # Usage
//! 1. Create a [`Resolver`] over an [`Index`].
//! 1. Optionally give it [`preferred`](Resolver::preferred()) distributions, usually what is already linked.
//! 1. [`Resolver::solve()`] to get a [`ResolvedSet`].
//!
//! The resolver is greedy, it always takes the newest build compatible with what is known so far
//! and only backtracks when that choice leaves a dependency impossible to fulfill.
//! When a dependent blamed for a conflict runs out of builds its rejections are undone and an older
//! dependent of the same conflict is blamed instead, the request only fails once every one of them has run out.
//! It is not a complete solver, a dependent that ran out for a conflict is never blamed for it again,
//! so some satisfiable requests with many conflicting constraints can still fail.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::prelude::*;

use crate::index::{Dist, Index, PackageRecord, Spec};

mod dependency_graph;
use dependency_graph::*;

mod resolved_set;
pub use resolved_set::ResolvedSet;

/// These errors halt the resolver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
	/// No record in the index has the spec's name.
	#[error("no packages found matching: {0}")]
	SpecNotFound(String),
	/// No build of `name` satisfies all of `specs` at once.
	#[error("unsatisfiable package specifications for {name}: {}", specs.join(", "))]
	Unsatisfiable {
		name: String,
		specs: Vec<String>,
	},
}

/// Resolves specs against an [`Index`].
///
/// Holds no mutable state, the same resolver can solve any number of requests.
#[derive(Debug, Clone)]
pub struct Resolver<'idx> {
	index: &'idx Index,
	preferred: BTreeSet<Dist>,
}

impl<'idx> Resolver<'idx> {
	pub fn new(index: &'idx Index) -> Self {
		Self {
			index,
			preferred: Default::default(),
		}
	}

	/// Distributions to keep over newer builds as long as they satisfy every demand on their name.
	pub fn preferred(mut self, dists: impl IntoIterator<Item = Dist>) -> Self {
		self.preferred = dists.into_iter().collect();
		self
	}

	pub fn index(&self) -> &'idx Index {
		self.index
	}

	/// Computes the set of distributions satisfying `specs` and all of their dependencies.
	///
	/// # Errors
	/// - [`ResolveError::SpecNotFound`] when a spec, or a dependency that can't be avoided, names no package in the index.
	/// - [`ResolveError::Unsatisfiable`] when the demands on a name can't all be met.
	pub fn solve(&self, specs: &[Spec]) -> Result<ResolvedSet, ResolveError> {
		/* Overview of process
		Each pass walks the graph breadth first from the meta node and chooses a package for every name
		that is new or had its demands changed. Choosing a package swaps its outgoing demands for the
		record's dependencies which may dirty other names, so passes repeat until nothing is dirty.
		 */
		log::debug!("Resolving {} spec(s)", specs.len());

		let mut dep_graph = DependencyGraph::default();
		for spec in specs {
			dep_graph.add_demand(dep_graph.meta_node, spec);
		}

		let mut rejections = Rejections::default();
		/* Why each name had builds rejected, reported if that name runs out of candidates */
		let mut causes = HashMap::<String, ResolveError>::new();

		let pass_limit = self.index.name_count() + 1;
		let mut passes_left = pass_limit;

		loop {
			dep_graph.clear_loose_nodes();

			let mut found_dirty = false;
			let mut backtracked = false;
			let mut failure = None::<ResolveError>;

			let mut visited = HashSet::<NodeIndex>::with_capacity(dep_graph.graph.node_count());
			let mut queue = VecDeque::<NodeIndex>::new();
			queue.push_back(dep_graph.meta_node);

			while let Some(i) = queue.pop_front() {
				if !visited.insert(i) { continue; }

				if dep_graph.is_dirty(i) {
					found_dirty = true;
					if let Err(e) = self.determine_package_for_node(&mut dep_graph, i, &rejections.dists) {
						let name = dep_graph.node_name(i).unwrap_or_default().to_string();
						let cause = causes.remove(&name).unwrap_or(e);
						match self.backtrack(&mut dep_graph, i, &mut rejections) {
							Some(culprit) => {
								causes.entry(culprit).or_insert(cause);
								backtracked = true;
							},
							None => {
								failure = Some(cause);
								break;
							},
						}
					}
				}

				queue.extend(dep_graph.dependencies_of(i));
			}

			if let Some(e) = failure {
				log::debug!("Resolve failed: {}", e);
				return Err(e)
			}

			if !found_dirty {
				break
			}

			if backtracked {
				passes_left = pass_limit;
			} else {
				passes_left -= 1;
				if passes_left == 0 {
					return Err(ResolveError::Unsatisfiable {
						name: "<request>".to_string(),
						specs: specs.iter().map(Spec::to_string).collect(),
					})
				}
			}
		}

		let chosen: BTreeMap<String, (Dist, Vec<String>)> = dep_graph.chosen_packages()
			.into_iter()
			.map(|(i, dist)| {
				let deps = dep_graph.dependencies_of(i).into_iter()
					.filter_map(|d| dep_graph.node_name(d).map(str::to_string))
					.collect();
				(dist.name().to_string(), (dist.clone(), deps))
			})
			.collect();

		let resolved = ResolvedSet::new(chosen);
		log::debug!("Resolved {} package(s)", resolved.len());
		Ok(resolved)
	}

	/// Chooses the newest package meeting every demand on `src` which hasn't been rejected.
	///
	/// This makes no attempt to resolve conflicts arising from this choice, later passes handle that.
	fn determine_package_for_node(&self, dep_graph: &mut DependencyGraph, src: NodeIndex, rejected: &HashMap<String, BTreeSet<Dist>>) -> Result<(), ResolveError> {
		let name = dep_graph.node_name(src).unwrap_or_default().to_string();
		let demands: Vec<Spec> = dep_graph.demands_on(src).into_iter().map(|(_, d)| d.spec.clone()).collect();

		if !self.index.has_name(&name) {
			let spec = demands.first().map(Spec::to_string).unwrap_or(name);
			return Err(ResolveError::SpecNotFound(spec))
		}

		let no_rejections = BTreeSet::new();
		let rejected = rejected.get(&name).unwrap_or(&no_rejections);

		let candidates: Vec<(&Dist, &PackageRecord)> = self.index.records_named(&name)
			.filter(|(dist, record)| !rejected.contains(*dist) && demands.iter().all(|s| s.matches_record(record)))
			.collect();

		let choice = candidates.iter()
			.filter(|(dist, _)| self.preferred.contains(*dist))
			.max_by(|a, b| compare_candidates(*a, *b))
			.or_else(|| candidates.iter().max_by(|a, b| compare_candidates(*a, *b)));

		match choice {
			Some((dist, record)) => {
				if dep_graph.set_node_as_package(src, dist, record) {
					log::trace!("Chose {} for {}", dist, name);
				}
				Ok(())
			},
			None => {
				dep_graph.reset_node(src);
				Err(ResolveError::Unsatisfiable {
					name: name.clone(),
					specs: demands.iter().map(Spec::to_string).collect(),
				})
			},
		}
	}

	/// Finds a package to reject so the failed `src` can be determined again.
	///
	/// If `src` was itself rejected for a conflict it has run out of builds, so its rejections are undone
	/// and the blame moves to an older dependent of that conflict. Otherwise the package behind the most
	/// recent demand on `src` is rejected.
	///
	/// Returns the name of the package to retry, or `None` if nothing is left to blame.
	fn backtrack(&self, dep_graph: &mut DependencyGraph, src: NodeIndex, rejections: &mut Rejections) -> Option<String> {
		let name = dep_graph.node_name(src)?.to_string();

		if let Some(conflict) = rejections.blamed_for.remove(&name) {
			log::debug!("{} ran out of builds, restoring it and blaming another dependent of {}", name, conflict);
			rejections.dists.remove(&name);
			rejections.exhausted.entry(conflict.clone()).or_default().insert(name.clone());

			match dep_graph.node_index(&conflict) {
				Some(target) => {
					if let Some(culprit) = self.reject_latest_dependent(dep_graph, target, &conflict, rejections) {
						return Some(culprit)
					}
				},
				/* Nothing demands the conflicting name anymore, retrying with every build is progress */
				None => return Some(name),
			}
		}

		self.reject_latest_dependent(dep_graph, src, &name, rejections)
	}

	/// Rejects the package behind the most recent demand on `target` that came from another package,
	/// skipping packages which already ran out of builds for `target_name`.
	fn reject_latest_dependent(&self, dep_graph: &mut DependencyGraph, target: NodeIndex, target_name: &str, rejections: &mut Rejections) -> Option<String> {
		let exhausted = rejections.exhausted.get(target_name);
		let culprit = dep_graph.demands_on(target).into_iter()
			.rev()
			.map(|(source, _)| source)
			.filter(|source| dep_graph.chosen_dist(*source).is_some())
			.find(|source| {
				let name = dep_graph.node_name(*source).unwrap_or_default();
				!exhausted.map_or(false, |e| e.contains(name))
			})?;

		let dist = dep_graph.chosen_dist(culprit)?.clone();
		let name = dist.name().to_string();
		log::debug!("Backtracking, rejecting {} as it requires an impossible {}", dist, target_name);

		rejections.dists.entry(name.clone()).or_default().insert(dist);
		rejections.blamed_for.insert(name.clone(), target_name.to_string());
		dep_graph.reset_node(culprit);
		Some(name)
	}
}

/// Backtracking state of a single solve.
#[derive(Debug, Default)]
struct Rejections {
	/// Builds ruled out per name.
	dists: HashMap<String, BTreeSet<Dist>>,
	/// The conflicting name each package was last rejected for.
	blamed_for: HashMap<String, String>,
	/// Packages which ran out of builds per conflicting name, these aren't blamed for it again.
	exhausted: HashMap<String, HashSet<String>>,
}

/// Orders candidates by version, then build number, then identifier.
fn compare_candidates(a: &(&Dist, &PackageRecord), b: &(&Dist, &PackageRecord)) -> std::cmp::Ordering {
	a.1.version.cmp(&b.1.version)
		.then_with(|| a.1.build_number.cmp(&b.1.build_number))
		.then_with(|| a.0.cmp(b.0))
}

/// Shorthand for `Resolver::new(index).solve(specs)`.
pub fn solve(index: &Index, specs: &[Spec]) -> Result<ResolvedSet, ResolveError> {
	Resolver::new(index).solve(specs)
}
