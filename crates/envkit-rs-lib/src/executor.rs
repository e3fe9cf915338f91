//! Applies planned [`Action`]s to a prefix.
//!
//! Actions run strictly in order while holding the prefix's [`PrefixLock`].
//! There is no rollback, a failure leaves every action before it applied.
//! Each action checks its own precondition first so re-running a plan, or re-planning, picks up where it stopped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::index::{Dist, Index};
use crate::installation::{Deployment, DeploymentError, DownloadError, Fetcher};
use crate::planner::Action;
use crate::prefix::{Prefix, PrefixLock};

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
	#[error("download error: {0}")]
	Download(#[from] DownloadError),
	#[error("deployment error: {0}")]
	Deployment(#[from] DeploymentError),
}

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
	/// Fetching requires an index to look up package records.
	#[error("an index is required to fetch packages.")]
	MissingIndex,
	#[error("{0} is not in the index.")]
	RecordMissing(Dist),
	/// Linking a package which isn't in any package cache directory.
	#[error("{0} has not been fetched.")]
	NotFetched(Dist),
	#[error("failed to lock prefix: {0}")]
	Lock(std::io::Error),
	#[error("cancelled after {completed} action(s).")]
	Cancelled {
		completed: usize,
	},
	#[error("failed to {action} after {completed} action(s): {source}")]
	Action {
		action: Action,
		completed: usize,
		source: ActionError,
	},
}

pub struct Executor<'a> {
	config: &'a Config,
	fetcher: &'a dyn Fetcher,
	deployment: &'a dyn Deployment,
	cancel: Option<&'a AtomicBool>,
}

impl<'a> Executor<'a> {
	pub fn new(config: &'a Config, fetcher: &'a dyn Fetcher, deployment: &'a dyn Deployment) -> Self {
		Self { config, fetcher, deployment, cancel: None }
	}

	/// Checked before every action, execution stops once it is set.
	pub fn with_cancel_flag(mut self, cancel: &'a AtomicBool) -> Self {
		self.cancel = Some(cancel);
		self
	}

	/// Applies `actions` in order, updating `prefix` as each link or unlink succeeds.
	///
	/// # Errors
	/// - [`ExecuteError::MissingIndex`] before anything runs when there is a fetch but no index.
	/// - [`ExecuteError::Lock`] when the prefix can't be locked.
	/// - [`ExecuteError::Cancelled`] when the cancel flag is set.
	/// - Any other error reports the failing action, earlier actions remain applied.
	pub fn execute(&self, prefix: &mut Prefix, actions: &[Action], index: Option<&Index>) -> Result<(), ExecuteError> {
		if index.is_none() && actions.iter().any(|a| matches!(a, Action::Fetch(_))) {
			return Err(ExecuteError::MissingIndex)
		}

		let _lock = PrefixLock::acquire(prefix.path()).map_err(ExecuteError::Lock)?;

		for (completed, action) in actions.iter().enumerate() {
			if self.cancel.map_or(false, |c| c.load(Ordering::SeqCst)) {
				log::info!("Cancelled with {} of {} action(s) done", completed, actions.len());
				return Err(ExecuteError::Cancelled { completed })
			}

			log::info!("Executing {}", action);
			let result = match action {
				Action::Fetch(dist) => self.fetch(dist, index),
				Action::Link(dist) => self.link(prefix, dist),
				Action::Unlink(dist) => self.unlink(prefix, dist),
			};
			result.map_err(|e| match e {
				StepError::Execute(e) => e,
				StepError::Action(source) => ExecuteError::Action { action: action.clone(), completed, source },
			})?;
		}
		Ok(())
	}

	fn find_fetched(&self, dist: &Dist) -> Option<&PathBuf> {
		self.config.pkgs_dirs().iter().find(|dir| self.fetcher.is_fetched(dir, dist))
	}

	fn fetch(&self, dist: &Dist, index: Option<&Index>) -> Result<(), StepError> {
		if let Some(dir) = self.find_fetched(dist) {
			log::debug!("{} already fetched in {}", dist, dir.display());
			return Ok(())
		}
		let record = index
			.ok_or(ExecuteError::MissingIndex)?
			.get(dist)
			.ok_or_else(|| ExecuteError::RecordMissing(dist.clone()))?;
		let pkgs_dir: &Path = self.config.package_cache_dir();
		self.fetcher.fetch(dist, record, pkgs_dir).map_err(ActionError::from)?;
		Ok(())
	}

	fn link(&self, prefix: &mut Prefix, dist: &Dist) -> Result<(), StepError> {
		if prefix.is_linked(dist) {
			log::debug!("{} already linked", dist);
			return Ok(())
		}
		let pkgs_dir = self.find_fetched(dist).ok_or_else(|| ExecuteError::NotFetched(dist.clone()))?;
		self.deployment.link(pkgs_dir, prefix.path(), dist).map_err(ActionError::from)?;
		prefix.mark_linked(dist.clone());
		Ok(())
	}

	fn unlink(&self, prefix: &mut Prefix, dist: &Dist) -> Result<(), StepError> {
		if !prefix.is_linked(dist) {
			log::debug!("{} not linked", dist);
			return Ok(())
		}
		self.deployment.unlink(prefix.path(), dist).map_err(ActionError::from)?;
		prefix.mark_unlinked(dist);
		Ok(())
	}
}

/// Separates errors already fully described from collaborator failures needing the action attached.
enum StepError {
	Execute(ExecuteError),
	Action(ActionError),
}

impl From<ExecuteError> for StepError {
	fn from(value: ExecuteError) -> Self {
		StepError::Execute(value)
	}
}

impl From<ActionError> for StepError {
	fn from(value: ActionError) -> Self {
		StepError::Action(value)
	}
}
