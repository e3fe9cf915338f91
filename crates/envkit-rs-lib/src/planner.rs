//! Turns the difference between what is wanted and what is linked into a list of [`Action`]s.

use std::collections::BTreeSet;

use crate::config::{Config, ReinstallPolicy};
use crate::index::{Dist, Index, Spec};
use crate::installation::Fetcher;
use crate::prefix::Prefix;
use crate::resolver::{ResolveError, Resolver};

/// A single step applied to a prefix by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
	/// Materialize the package in the package cache.
	Fetch(Dist),
	/// Add the package's files to the prefix.
	Link(Dist),
	/// Remove the package's files from the prefix.
	Unlink(Dist),
}

impl Action {
	pub fn dist(&self) -> &Dist {
		match self {
			Action::Fetch(d) | Action::Link(d) | Action::Unlink(d) => d,
		}
	}
}

impl std::fmt::Display for Action {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Action::Fetch(d) => write!(f, "fetch {}", d),
			Action::Link(d) => write!(f, "link {}", d),
			Action::Unlink(d) => write!(f, "unlink {}", d),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
	#[error("{0}")]
	Resolve(#[from] ResolveError),
	/// Nothing linked in the prefix matches the spec.
	#[error("no package matching \"{0}\" is installed.")]
	NameNotInstalled(String),
	/// Packages which can't be removed from the root environment.
	#[error("cannot remove protected package(s) from the root environment: {}", .0.join(", "))]
	ProtectedPackage(Vec<String>),
	/// Packages which can only be installed into the root environment.
	#[error("package(s) can only be installed into the root environment: {}", .0.join(", "))]
	RootOnlyPackage(Vec<String>),
	/// The prefix already matches the request.
	#[error("no action needed.")]
	NoActionNeeded,
}

/// Plans installs and removals for a single prefix at a time.
pub struct Planner<'a> {
	config: &'a Config,
	fetcher: &'a dyn Fetcher,
}

impl<'a> Planner<'a> {
	pub fn new(config: &'a Config, fetcher: &'a dyn Fetcher) -> Self {
		Self { config, fetcher }
	}

	fn is_fetched(&self, dist: &Dist) -> bool {
		self.config.pkgs_dirs().iter().any(|dir| self.fetcher.is_fetched(dir, dist))
	}

	/// Actions bringing `prefix` to the resolution of `specs`, possibly none.
	///
	/// Ordered as every fetch, then every unlink of a replaced package, then every link
	/// with dependencies linked before the packages needing them.
	///
	/// # Errors
	/// - [`PlanError::RootOnlyPackage`] when a spec names a root only package and `prefix` isn't the root.
	/// - [`PlanError::Resolve`] when the specs can't be resolved.
	pub fn install_actions(&self, prefix: &Prefix, index: &Index, specs: &[Spec]) -> Result<Vec<Action>, PlanError> {
		if !prefix.is_root(self.config) {
			let root_only: BTreeSet<String> = specs.iter()
				.map(Spec::name)
				.filter(|n| self.config.root_only_packages().contains(*n))
				.map(str::to_string)
				.collect();
			if !root_only.is_empty() {
				return Err(PlanError::RootOnlyPackage(root_only.into_iter().collect()))
			}
		}

		let mut resolver = Resolver::new(index);
		if self.config.reinstall_policy() == ReinstallPolicy::PreferLinked {
			resolver = resolver.preferred(prefix.linked().iter().cloned());
		}
		let resolved = resolver.solve(specs)?;

		let mut fetches = Vec::<Action>::new();
		let mut unlinks = Vec::<Action>::new();
		let mut links = Vec::<Action>::new();
		for dist in resolved.install_order() {
			if prefix.is_linked(dist) {
				continue;
			}
			for old in prefix.linked_named(dist.name()) {
				unlinks.push(Action::Unlink(old.clone()));
			}
			if !self.is_fetched(dist) {
				fetches.push(Action::Fetch(dist.clone()));
			}
			links.push(Action::Link(dist.clone()));
		}

		let mut actions = fetches;
		actions.append(&mut unlinks);
		actions.append(&mut links);
		log::debug!("Planned {} action(s) to install into {}", actions.len(), prefix.path().display());
		Ok(actions)
	}

	/// Like [`install_actions()`](Self::install_actions()) but an empty plan is [`PlanError::NoActionNeeded`].
	pub fn plan_install(&self, prefix: &Prefix, index: &Index, specs: &[Spec]) -> Result<Vec<Action>, PlanError> {
		non_empty(self.install_actions(prefix, index, specs)?)
	}

	/// Unlinks of exactly the linked packages matching `specs`, their dependencies and dependents are left alone.
	///
	/// # Errors
	/// - [`PlanError::ProtectedPackage`] when `prefix` is the root and any spec names a protected package.
	/// - [`PlanError::NameNotInstalled`] when a spec matches nothing linked.
	pub fn remove_actions(&self, prefix: &Prefix, specs: &[Spec]) -> Result<Vec<Action>, PlanError> {
		if prefix.is_root(self.config) {
			let protected: BTreeSet<String> = specs.iter()
				.map(Spec::name)
				.filter(|n| self.config.protected_packages().contains(*n))
				.map(str::to_string)
				.collect();
			if !protected.is_empty() {
				return Err(PlanError::ProtectedPackage(protected.into_iter().collect()))
			}
		}

		let mut actions = Vec::<Action>::new();
		for spec in specs {
			let matched: Vec<&Dist> = prefix.linked_named(spec.name()).filter(|d| spec.matches_dist(d)).collect();
			if matched.is_empty() {
				return Err(PlanError::NameNotInstalled(spec.to_string()))
			}
			for dist in matched {
				let action = Action::Unlink(dist.clone());
				if !actions.contains(&action) {
					actions.push(action);
				}
			}
		}
		log::debug!("Planned {} action(s) to remove from {}", actions.len(), prefix.path().display());
		Ok(actions)
	}

	/// Like [`remove_actions()`](Self::remove_actions()) but an empty plan is [`PlanError::NoActionNeeded`].
	pub fn plan_remove(&self, prefix: &Prefix, specs: &[Spec]) -> Result<Vec<Action>, PlanError> {
		non_empty(self.remove_actions(prefix, specs)?)
	}
}

fn non_empty(actions: Vec<Action>) -> Result<Vec<Action>, PlanError> {
	if actions.is_empty() {
		Err(PlanError::NoActionNeeded)
	} else {
		Ok(actions)
	}
}
