//! Explicit configuration passed to every operation.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::index::{ParseError, Spec};

/// Packages that can't be removed from the root environment.
pub const DEFAULT_PROTECTED_PACKAGES: [&str; 4] = ["python", "pycosat", "pyyaml", "conda"];
/// Packages that may only be installed into the root environment.
pub const DEFAULT_ROOT_ONLY_PACKAGES: [&str; 1] = ["conda"];

/// How to treat packages already linked in a prefix when installing into it again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReinstallPolicy {
	/// Always resolve to the newest compatible builds, upgrading linked packages.
	#[default]
	PreferNewest,
	/// Keep linked builds when they still satisfy every requirement.
	PreferLinked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
	root_dir: PathBuf,
	envs_dirs: Vec<PathBuf>,
	pkgs_dirs: Vec<PathBuf>,
	protected_packages: BTreeSet<String>,
	root_only_packages: BTreeSet<String>,
	/// Names refused when parsing pinned arguments.
	#[serde(default)]
	disallowed_packages: BTreeSet<String>,
	#[serde(default)]
	reinstall_policy: ReinstallPolicy,
	#[serde(default = "default_verify_checksums")]
	verify_checksums: bool,
}

fn default_verify_checksums() -> bool {
	true
}

impl Config {
	/// Creates a config rooted at `root_dir` with environments in `<root>/envs` and the package cache in `<root>/pkgs`.
	pub fn new(root_dir: impl Into<PathBuf>) -> Self {
		let root_dir = root_dir.into();
		Self {
			envs_dirs: vec![root_dir.join("envs")],
			pkgs_dirs: vec![root_dir.join("pkgs")],
			root_dir,
			protected_packages: DEFAULT_PROTECTED_PACKAGES.iter().map(|s| s.to_string()).collect(),
			root_only_packages: DEFAULT_ROOT_ONLY_PACKAGES.iter().map(|s| s.to_string()).collect(),
			disallowed_packages: Default::default(),
			reinstall_policy: Default::default(),
			verify_checksums: default_verify_checksums(),
		}
	}

	/// Roots the config at `$ENVKIT_ROOT`, falling back to the user data directory.
	///
	/// # Errors
	/// - [`Config`](crate::Error::Config) when none of `ENVKIT_ROOT`, `XDG_DATA_HOME` or `HOME` are set.
	pub fn from_env() -> crate::Result<Self> {
		let root = if let Ok(root) = std::env::var("ENVKIT_ROOT") {
			PathBuf::from(root)
		} else if let Ok(data) = std::env::var("XDG_DATA_HOME") {
			PathBuf::from(data).join("envkit")
		} else if let Ok(home) = std::env::var("HOME") {
			PathBuf::from(home).join(".local/share").join("envkit")
		} else {
			return Err(crate::Error::Config("no root directory, set ENVKIT_ROOT.".to_string()))
		};
		Ok(Self::new(root))
	}

	/* Serialization */

	/// # Errors
	/// - [`IO`](crate::Error::IO) when reading the file.
	/// - [`SerdeJSON`](crate::Error::SerdeJSON) when deserializing the file.
	/// - [`Config`](crate::Error::Config) when no package cache directory is configured.
	pub fn load_from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
		let file = std::fs::File::open(path)?;
		let config: Config = serde_json::from_reader(std::io::BufReader::new(file))?;
		if config.pkgs_dirs.is_empty() {
			return Err(crate::Error::Config("at least one package cache directory is required.".to_string()))
		}
		Ok(config)
	}

	pub fn save_to_file(&self, path: impl AsRef<Path>) -> crate::Result<()> {
		let path = path.as_ref();
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let file = std::fs::File::create(path)?;
		serde_json::to_writer_pretty(file, self)?;
		Ok(())
	}

	/* Fields */

	pub fn root_dir(&self) -> &Path {
		&self.root_dir
	}

	pub fn envs_dirs(&self) -> &[PathBuf] {
		&self.envs_dirs
	}
	pub fn set_envs_dirs(&mut self, envs_dirs: Vec<PathBuf>) {
		self.envs_dirs = envs_dirs;
	}

	pub fn pkgs_dirs(&self) -> &[PathBuf] {
		&self.pkgs_dirs
	}
	/// returns if the list is valid or not, at least one directory is required.
	pub fn set_pkgs_dirs(&mut self, pkgs_dirs: Vec<PathBuf>) -> bool {
		if pkgs_dirs.is_empty() {
			false
		} else {
			self.pkgs_dirs = pkgs_dirs;
			true
		}
	}

	/// Where new packages are fetched to.
	pub fn package_cache_dir(&self) -> &Path {
		/* `pkgs_dirs` is never empty, see `set_pkgs_dirs` and `load_from_file` */
		self.pkgs_dirs.first().map(PathBuf::as_path).unwrap_or(&self.root_dir)
	}

	pub fn protected_packages(&self) -> &BTreeSet<String> {
		&self.protected_packages
	}
	pub fn set_protected_packages(&mut self, names: impl IntoIterator<Item = impl Into<String>>) {
		self.protected_packages = names.into_iter().map(Into::into).collect();
	}

	pub fn root_only_packages(&self) -> &BTreeSet<String> {
		&self.root_only_packages
	}
	pub fn set_root_only_packages(&mut self, names: impl IntoIterator<Item = impl Into<String>>) {
		self.root_only_packages = names.into_iter().map(Into::into).collect();
	}

	pub fn disallowed_packages(&self) -> &BTreeSet<String> {
		&self.disallowed_packages
	}
	pub fn set_disallowed_packages(&mut self, names: impl IntoIterator<Item = impl Into<String>>) {
		self.disallowed_packages = names.into_iter().map(Into::into).collect();
	}

	pub fn reinstall_policy(&self) -> ReinstallPolicy {
		self.reinstall_policy
	}
	pub fn set_reinstall_policy(&mut self, policy: ReinstallPolicy) {
		self.reinstall_policy = policy;
	}

	pub fn verify_checksums(&self) -> bool {
		self.verify_checksums
	}
	pub fn set_verify_checksums(&mut self, verify_checksums: bool) {
		self.verify_checksums = verify_checksums;
	}

	/// Parses a `name[=version[=build]]` argument with [`Spec::from_pinned_arg()`], refusing disallowed names.
	pub fn parse_pinned_arg(&self, arg: &str) -> Result<Spec, ParseError> {
		let spec = Spec::from_pinned_arg(arg)?;
		if self.disallowed_packages.contains(spec.name()) {
			return Err(ParseError::Disallowed(spec.to_string()))
		}
		Ok(spec)
	}

	/* Prefixes */

	/// Checks if `prefix` is the root environment.
	pub fn is_root_prefix(&self, prefix: impl AsRef<Path>) -> bool {
		let prefix = prefix.as_ref();
		match (prefix.canonicalize(), self.root_dir.canonicalize()) {
			(Ok(a), Ok(b)) => a == b,
			_ => prefix == self.root_dir,
		}
	}

	/// The root prefix followed by every directory inside the environment directories.
	///
	/// Environment directories that don't exist are skipped.
	pub fn environment_prefixes(&self) -> crate::Result<Vec<PathBuf>> {
		let mut prefixes = vec![self.root_dir.clone()];
		for envs_dir in &self.envs_dirs {
			if !envs_dir.is_dir() {
				log::trace!("Skipping missing environment directory {}", envs_dir.display());
				continue;
			}
			let mut found = Vec::<PathBuf>::new();
			for entry in envs_dir.read_dir()? {
				let path = entry?.path();
				if path.is_dir() {
					found.push(path);
				}
			}
			found.sort();
			prefixes.append(&mut found);
		}
		Ok(prefixes)
	}
}
