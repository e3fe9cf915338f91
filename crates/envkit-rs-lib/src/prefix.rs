//! The installed state of an environment.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::index::Dist;
use crate::installation::deployment::{Deployment, DeploymentError};

mod lock;
pub use lock::PrefixLock;
pub use lock::LOCK_FILE_NAME;

/// A prefix and the distributions linked into it.
///
/// This is a snapshot, planning should always start from a fresh [`Prefix::load()`].
/// The executor keeps it up to date as actions complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
	path: PathBuf,
	linked: BTreeSet<Dist>,
}

impl Prefix {
	/// Reads what is linked in `path` from the deployment.
	pub fn load(path: impl Into<PathBuf>, deployment: &dyn Deployment) -> Result<Self, DeploymentError> {
		let path = path.into();
		let linked = deployment.linked(&path)?;
		log::trace!("{} has {} linked package(s)", path.display(), linked.len());
		Ok(Self { path, linked })
	}

	pub fn new(path: impl Into<PathBuf>, linked: impl IntoIterator<Item = Dist>) -> Self {
		Self {
			path: path.into(),
			linked: linked.into_iter().collect(),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn linked(&self) -> &BTreeSet<Dist> {
		&self.linked
	}

	pub fn is_linked(&self, dist: &Dist) -> bool {
		self.linked.contains(dist)
	}

	/// Linked distributions of the package `name`.
	pub fn linked_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Dist> + 'a {
		self.linked.iter().filter(move |d| d.name() == name)
	}

	pub fn is_root(&self, config: &Config) -> bool {
		config.is_root_prefix(&self.path)
	}

	pub(crate) fn mark_linked(&mut self, dist: Dist) {
		self.linked.insert(dist);
	}

	pub(crate) fn mark_unlinked(&mut self, dist: &Dist) {
		self.linked.remove(dist);
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn prefix_finds_linked_by_name() {
		let prefix = Prefix::new("/tmp/env", [
			Dist::new("pkgA-1.0-0").unwrap(),
			Dist::new("pkgB-2.1-0").unwrap(),
			Dist::new("pkgB-extra-1.0-0").unwrap(),
		]);
		let b: Vec<&str> = prefix.linked_named("pkgB").map(Dist::as_str).collect();
		assert_eq!(b, vec!["pkgB-2.1-0"]);
		assert!(prefix.is_linked(&Dist::new("pkgA-1.0-0").unwrap()));
		assert!(!prefix.is_linked(&Dist::new("pkgA-2.0-0").unwrap()));
	}
}
