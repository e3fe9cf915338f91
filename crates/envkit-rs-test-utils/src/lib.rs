//! Various helper functions for testing
//!
//! functions in this module should use results and not use any panics to avoid confusion in callers

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use envkit_rs::index::{Dist, Index, PackageRecord, PackageVersion, ParseError, Spec};
use envkit_rs::installation::{Deployment, DeploymentError, DownloadError, Fetcher};
use envkit_rs::Config;

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("parse error: {0}")]
	Parse(#[from] ParseError),
	#[error("envkit error: {0}")]
	Envkit(#[from] envkit_rs::Error),
	#[error("copy error: {0}")]
	FsExtra(#[from] fs_extra::error::Error),
}

pub type Result<T> = std::result::Result<T, FixtureError>;

/// Sends library logs to the test output, safe to call from every test.
pub fn init_logging() {
	let _ = env_logger::builder().is_test(true).try_init();
}

pub const TEST_CHANNEL: &str = "http://repo.example.com/pkgs/free/linux-64/";

/// A record for `dist` with the given dependency specs.
pub fn record(dist: &str, depends: &[&str]) -> Result<(Dist, PackageRecord)> {
	let dist = Dist::new(dist)?;
	let (name, version, build) = dist.parts();
	let record = PackageRecord {
		name: name.to_string(),
		version: PackageVersion::new(version)?,
		build: build.to_string(),
		build_number: 0,
		depends: depends.iter().map(|s| Spec::new(s)).collect::<std::result::Result<_, _>>()?,
		size: 1024,
		channel: TEST_CHANNEL.to_string(),
		kind: None,
		icon: None,
		sha256: None,
	};
	Ok((dist, record))
}

/// Collects records for an [`Index`].
#[derive(Debug, Default)]
pub struct IndexBuilder {
	records: Vec<(Dist, PackageRecord)>,
	error: Option<FixtureError>,
}

impl IndexBuilder {
	pub fn new() -> Self {
		Default::default()
	}

	pub fn package(self, dist: &str, depends: &[&str]) -> Self {
		self.package_with(dist, depends, |_| {})
	}

	/// Adds a package, `edit` can change any field of the record.
	pub fn package_with(mut self, dist: &str, depends: &[&str], edit: impl FnOnce(&mut PackageRecord)) -> Self {
		match record(dist, depends) {
			Ok((dist, mut record)) => {
				edit(&mut record);
				self.records.push((dist, record));
			},
			Err(e) => { self.error.get_or_insert(e); },
		}
		self
	}

	pub fn build(self) -> Result<Index> {
		if let Some(e) = self.error {
			return Err(e)
		}
		Ok(Index::from_records(self.records)?)
	}
}

/// The index used across the integration tests.
///
/// - `pkgA-1.0-0` needs `pkgB >=2.0`, and `pkgB-2.1-0`, `pkgB-1.9-0` exist.
/// - `python` is the root of a small dependency tree with `numpy` and `scipy`.
/// - `conda` is protected and root only under the default config.
pub fn sample_index() -> Result<Index> {
	IndexBuilder::new()
		.package("pkgA-1.0-0", &["pkgB >=2.0"])
		.package("pkgB-2.1-0", &[])
		.package("pkgB-1.9-0", &[])
		.package("python-2.7.5-0", &[])
		.package("python-3.3.2-0", &[])
		.package("numpy-1.7.1-py27_0", &["python 2.7*"])
		.package("numpy-1.7.1-py33_0", &["python 3.3*"])
		.package("scipy-0.12.0-py27_0", &["numpy 1.7*", "python 2.7*"])
		.package("conda-1.7.2-py27_0", &["python 2.7*", "pycosat"])
		.package("pycosat-0.6.0-py27_0", &["python 2.7*"])
		.build()
}

/// A temporary root directory with a [`Config`] pointing into it.
pub struct TestRoot {
	pub dir: tempfile::TempDir,
	pub config: Config,
}

impl TestRoot {
	pub fn new() -> Result<Self> {
		let dir = tempfile::tempdir()?;
		let config = Config::new(dir.path());
		Ok(Self { dir, config })
	}

	pub fn root(&self) -> &Path {
		self.dir.path()
	}

	/// Path of the named environment, created on disk.
	pub fn env(&self, name: &str) -> Result<PathBuf> {
		let path = self.dir.path().join("envs").join(name);
		std::fs::create_dir_all(&path)?;
		Ok(path)
	}
}

/// Writes `<dir>/<dist>.tar.gz` containing `files` as `(path, contents)`.
pub fn write_package_archive(dir: &Path, dist: &Dist, files: &[(&str, &str)]) -> Result<PathBuf> {
	std::fs::create_dir_all(dir)?;
	let path = dir.join(dist.filename());
	let gz = flate2::write::GzEncoder::new(std::fs::File::create(&path)?, flate2::Compression::default());
	let mut builder = tar::Builder::new(gz);
	for (name, content) in files {
		let mut header = tar::Header::new_gnu();
		header.set_size(content.len() as u64);
		header.set_mode(0o644);
		header.set_cksum();
		builder.append_data(&mut header, name, content.as_bytes())?;
	}
	builder.into_inner()?.finish()?;
	Ok(path)
}

/// Copies every fetched package from one package cache directory to another.
pub fn mirror_package_cache(from: &Path, to: &Path) -> Result<()> {
	std::fs::create_dir_all(to)?;
	let mut options = fs_extra::dir::CopyOptions::new();
	options.overwrite = true;
	options.content_only = true;
	fs_extra::dir::copy(from, to, &options)?;
	Ok(())
}

fn injected(what: &str, dist: &Dist) -> std::io::Error {
	std::io::Error::new(std::io::ErrorKind::Other, format!("injected {} failure for {}", what, dist))
}

/// In memory [`Fetcher`] recording what it fetched, with failure injection.
#[derive(Debug, Default)]
pub struct MockFetcher {
	fetched: RefCell<BTreeSet<(PathBuf, Dist)>>,
	failing: RefCell<BTreeSet<Dist>>,
	log: RefCell<Vec<Dist>>,
}

impl MockFetcher {
	pub fn new() -> Self {
		Default::default()
	}

	/// Marks `dist` as already present in `pkgs_dir`.
	pub fn add_fetched(&self, pkgs_dir: &Path, dist: &Dist) {
		self.fetched.borrow_mut().insert((pkgs_dir.to_path_buf(), dist.clone()));
	}

	pub fn fail_on(&self, dist: &Dist) {
		self.failing.borrow_mut().insert(dist.clone());
	}

	/// Every successful fetch, in order.
	pub fn fetch_log(&self) -> Vec<Dist> {
		self.log.borrow().clone()
	}
}

impl Fetcher for MockFetcher {
	fn is_fetched(&self, pkgs_dir: &Path, dist: &Dist) -> bool {
		self.fetched.borrow().contains(&(pkgs_dir.to_path_buf(), dist.clone()))
	}

	fn fetch(&self, dist: &Dist, _record: &PackageRecord, pkgs_dir: &Path) -> std::result::Result<(), DownloadError> {
		if self.failing.borrow().contains(dist) {
			return Err(DownloadError::IO(injected("fetch", dist)))
		}
		self.add_fetched(pkgs_dir, dist);
		self.log.borrow_mut().push(dist.clone());
		Ok(())
	}
}

/// In memory [`Deployment`] tracking linked packages per prefix, with failure injection.
#[derive(Debug, Default)]
pub struct MockDeployment {
	linked: RefCell<BTreeMap<PathBuf, BTreeSet<Dist>>>,
	failing: RefCell<BTreeSet<Dist>>,
}

impl MockDeployment {
	pub fn new() -> Self {
		Default::default()
	}

	pub fn add_linked(&self, prefix: &Path, dist: &Dist) {
		self.linked.borrow_mut().entry(prefix.to_path_buf()).or_default().insert(dist.clone());
	}

	/// Makes both linking and unlinking `dist` fail.
	pub fn fail_on(&self, dist: &Dist) {
		self.failing.borrow_mut().insert(dist.clone());
	}
}

impl Deployment for MockDeployment {
	fn linked(&self, prefix: &Path) -> std::result::Result<BTreeSet<Dist>, DeploymentError> {
		Ok(self.linked.borrow().get(prefix).cloned().unwrap_or_default())
	}

	fn link(&self, _pkgs_dir: &Path, prefix: &Path, dist: &Dist) -> std::result::Result<(), DeploymentError> {
		if self.failing.borrow().contains(dist) {
			return Err(DeploymentError::IO(injected("link", dist)))
		}
		self.add_linked(prefix, dist);
		Ok(())
	}

	fn unlink(&self, prefix: &Path, dist: &Dist) -> std::result::Result<(), DeploymentError> {
		if self.failing.borrow().contains(dist) {
			return Err(DeploymentError::IO(injected("unlink", dist)))
		}
		let removed = self.linked.borrow_mut().get_mut(prefix).map_or(false, |set| set.remove(dist));
		if removed {
			Ok(())
		} else {
			Err(DeploymentError::NotLinked(dist.clone()))
		}
	}
}
