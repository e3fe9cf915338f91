//! Manager
//!
//! Merges the resolve, plan and execute steps into single calls taking archive file names,
//! `pkgA-1.0-0.tar.gz`, for applications built on top of the library.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::executor::Executor;
use crate::index::{Dist, Index, PackageRecord, PackageVersion, ParseError, Spec};
use crate::installation::{Deployment, Fetcher};
use crate::planner::{Action, Planner};
use crate::prefix::Prefix;

/// The exact spec for an archive file name, `pkgA-1.0-0.tar.gz` is `pkgA 1.0 0`.
pub fn spec_from_filename(filename: &str) -> Result<Spec, ParseError> {
	Spec::from_dist(&dist_from_filename(filename)?)
}

pub fn dist_from_filename(filename: &str) -> Result<Dist, ParseError> {
	Dist::from_filename(filename)
}

pub fn name_from_filename(filename: &str) -> Result<String, ParseError> {
	Ok(dist_from_filename(filename)?.name().to_string())
}

/// One entry of [`Manager::dependencies_for_display()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
	pub name: String,
	pub version: PackageVersion,
	pub size: u64,
	/// Already in a package cache directory, nothing to download.
	pub fetched: bool,
}

pub struct Manager<'a> {
	config: &'a Config,
	fetcher: &'a dyn Fetcher,
	deployment: &'a dyn Deployment,
}

impl<'a> Manager<'a> {
	pub fn new(config: &'a Config, fetcher: &'a dyn Fetcher, deployment: &'a dyn Deployment) -> Self {
		Self { config, fetcher, deployment }
	}

	pub fn config(&self) -> &Config {
		self.config
	}

	fn planner(&self) -> Planner<'a> {
		Planner::new(self.config, self.fetcher)
	}

	fn executor(&self) -> Executor<'a> {
		Executor::new(self.config, self.fetcher, self.deployment)
	}

	fn load_prefix(&self, prefix: Option<&Path>) -> crate::Result<Prefix> {
		let path = prefix.unwrap_or_else(|| self.config.root_dir());
		Ok(Prefix::load(path, self.deployment)?)
	}

	/// Installs the package and its dependencies into `prefix`, the root environment when `None`.
	///
	/// Returns the actions that were applied.
	///
	/// # Errors
	/// - [`PlanError::NoActionNeeded`](crate::planner::PlanError::NoActionNeeded) when it is already installed.
	/// - Any resolve, plan or execute error.
	pub fn install(&self, index: &Index, filename: &str, prefix: Option<&Path>) -> crate::Result<Vec<Action>> {
		let spec = spec_from_filename(filename)?;
		let mut prefix = self.load_prefix(prefix)?;
		log::info!("Installing {} into {}", spec, prefix.path().display());

		let actions = self.planner().plan_install(&prefix, index, &[spec])?;
		self.executor().execute(&mut prefix, &actions, Some(index))?;
		Ok(actions)
	}

	/// Removes the package, but not its dependencies, from `prefix`, the root environment when `None`.
	pub fn uninstall(&self, filename: &str, prefix: Option<&Path>) -> crate::Result<Vec<Action>> {
		let spec = spec_from_filename(filename)?;
		let mut prefix = self.load_prefix(prefix)?;
		log::info!("Removing {} from {}", spec, prefix.path().display());

		let actions = self.planner().plan_remove(&prefix, &[spec])?;
		self.executor().execute(&mut prefix, &actions, None)?;
		Ok(actions)
	}

	/// The package and everything it needs, dependencies first, with whether each still has to be downloaded.
	pub fn dependencies_for_display(&self, index: &Index, filename: &str) -> crate::Result<Vec<PackageSummary>> {
		let spec = spec_from_filename(filename)?;
		let resolved = crate::resolver::solve(index, &[spec])?;

		let mut summaries = Vec::<PackageSummary>::with_capacity(resolved.len());
		for dist in resolved.install_order() {
			let record = index.get(dist).ok_or_else(|| crate::Error::NotInIndex(dist.clone()))?;
			summaries.push(PackageSummary {
				name: record.name.clone(),
				version: record.version.clone(),
				size: record.size,
				fetched: self.config.pkgs_dirs().iter().any(|dir| self.fetcher.is_fetched(dir, dist)),
			});
		}
		Ok(summaries)
	}

	/// Every prefix the package is linked in, possibly none.
	pub fn installed_prefixes(&self, filename: &str) -> crate::Result<Vec<PathBuf>> {
		let dist = dist_from_filename(filename)?;
		let mut found = Vec::<PathBuf>::new();
		for path in self.config.environment_prefixes()? {
			if self.deployment.linked(&path)?.contains(&dist) {
				found.push(path);
			}
		}
		Ok(found)
	}

	/// URL of the icon for an application, `None` when the record has no icon.
	///
	/// Icons live in an `icons` directory beside the channel's platform directory.
	pub fn icon_url(&self, index: &Index, filename: &str) -> crate::Result<Option<String>> {
		let dist = dist_from_filename(filename)?;
		let record = index.get(&dist).ok_or(crate::Error::NotInIndex(dist))?;
		Ok(record.icon.as_ref().map(|icon| {
			let channel = record.channel.trim_end_matches('/');
			let base = channel.rsplit_once('/').map_or(channel, |(base, _)| base);
			format!("{}/icons/{}", base, icon)
		}))
	}
}

/// The application packages in `index`.
///
/// Only the newest build of each application unless `all_versions` is set.
pub fn app_index(index: &Index, all_versions: bool) -> Index {
	let apps = index.filtered(|_, record| record.is_app());
	if all_versions {
		return apps
	}

	let mut newest = BTreeMap::<&str, (&Dist, &PackageRecord)>::new();
	for (dist, record) in apps.iter() {
		let replace = match newest.get(record.name.as_str()) {
			Some((d, r)) => (&record.version, record.build_number, dist) > (&r.version, r.build_number, *d),
			None => true,
		};
		if replace {
			newest.insert(&record.name, (dist, record));
		}
	}
	apps.filtered(|dist, record| newest.get(record.name.as_str()).map_or(false, |(d, _)| *d == dist))
}
