//! # Deployment
//!
//! Here we link the files from a package's extracted contents into a prefix.
//!
//! Every linked package gets a record in [`META_DIR`] listing the files placed for it,
//! this is both how a prefix knows what is linked and how unlinking knows what to remove.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::index::Dist;
use super::content;

/// Directory inside a prefix holding the link records.
pub const META_DIR: &str = "envkit-meta";

/// Package metadata directory, never linked into a prefix.
const PACKAGE_INFO_DIR: &str = "info";

#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("error walking directory: {0}")]
	WalkDir(#[from] walkdir::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("couldn't locate contents of {0} for deployment.")]
	MissingContent(Dist),
	#[error("{0} is not linked.")]
	NotLinked(Dist),
	#[error("path {0} is outside of the package contents.")]
	InvalidPath(PathBuf),
}

/// Adds and removes package files in a prefix and reports what is linked.
pub trait Deployment {
	fn linked(&self, prefix: &Path) -> Result<BTreeSet<Dist>, DeploymentError>;
	/// Links the contents of `dist` from `pkgs_dir` into `prefix`.
	///
	/// On error no files of `dist` are left in the prefix.
	fn link(&self, pkgs_dir: &Path, prefix: &Path, dist: &Dist) -> Result<(), DeploymentError>;
	/// Removes the files of `dist` from `prefix`.
	///
	/// On error `dist` stays linked with its files in place.
	fn unlink(&self, prefix: &Path, dist: &Dist) -> Result<(), DeploymentError>;
}

/// Files placed in a prefix for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LinkRecord {
	dist: Dist,
	/// Relative to the prefix.
	files: Vec<PathBuf>,
}

fn get_link_record_path(prefix: &Path, dist: &Dist) -> PathBuf {
	prefix.join(META_DIR).join(format!("{}.json", dist))
}

/// Where files of `dist` wait while it is being unlinked.
fn get_staging_path(prefix: &Path, dist: &Dist) -> PathBuf {
	prefix.join(META_DIR).join(format!("{}.removing", dist))
}

/// Deploys packages with hard links, copying when the cache and prefix are on different filesystems.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardLinkDeployment;

impl HardLinkDeployment {
	/// Pairs of (`source`, `destination`) where `source` is absolute and `destination` is relative to the prefix.
	///
	/// Walks directories so the instructions are for files only.
	fn get_install_instructions(content_dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>, DeploymentError> {
		let mut instructions = Vec::<(PathBuf, PathBuf)>::new();
		let walker = walkdir::WalkDir::new(content_dir)
			.sort_by_file_name()
			.into_iter()
			.filter_entry(|e| !(e.depth() == 1 && e.file_name() == PACKAGE_INFO_DIR));
		for entry in walker {
			let entry = entry?;
			if entry.file_type().is_dir() { continue; }
			let source = entry.into_path();
			let destination = pathdiff::diff_paths(&source, content_dir).ok_or_else(|| DeploymentError::InvalidPath(source.clone()))?;
			instructions.push((source, destination));
		}
		Ok(instructions)
	}

	fn place_file(source: &Path, destination: &Path) -> std::io::Result<()> {
		if let Some(parent) = destination.parent() {
			std::fs::create_dir_all(parent)?;
		}
		if destination.symlink_metadata().is_ok() {
			std::fs::remove_file(destination)?;
		}
		if let Err(e) = std::fs::hard_link(source, destination) {
			log::trace!("Hard link failed for {}, copying instead: {}", destination.display(), e);
			std::fs::copy(source, destination)?;
		}
		Ok(())
	}

	/// Removes `files` then any directories left empty, stopping at the prefix.
	fn remove_files(prefix: &Path, files: &[PathBuf]) -> std::io::Result<()> {
		for f in files {
			match std::fs::remove_file(prefix.join(f)) {
				Ok(()) => {},
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
				Err(e) => return Err(e),
			}
		}
		Self::remove_empty_dirs(prefix, files)
	}

	fn remove_empty_dirs(prefix: &Path, files: &[PathBuf]) -> std::io::Result<()> {
		let mut dirs = BTreeSet::<PathBuf>::new();
		for f in files {
			let mut parent = f.parent();
			while let Some(p) = parent.filter(|p| !p.as_os_str().is_empty()) {
				dirs.insert(p.to_path_buf());
				parent = p.parent();
			}
		}
		/* Deepest first, so children are gone before their parents are checked */
		let mut dirs: Vec<PathBuf> = dirs.into_iter().collect();
		dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
		for d in dirs {
			let path = prefix.join(d);
			if path.read_dir().map(|mut it| it.next().is_none()).unwrap_or(false) {
				std::fs::remove_dir(&path)?;
			}
		}
		Ok(())
	}

	/// Moves `file` from the prefix into `staging`, returns `false` if it was already gone.
	fn stage_file(prefix: &Path, staging: &Path, file: &Path) -> std::io::Result<bool> {
		let source = prefix.join(file);
		match source.symlink_metadata() {
			Ok(_) => {},
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
			Err(e) => return Err(e),
		}
		let destination = staging.join(file);
		if let Some(parent) = destination.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::rename(source, destination)?;
		Ok(true)
	}

	fn restore_staged(prefix: &Path, staging: &Path, staged: &[PathBuf]) {
		for f in staged.iter().rev() {
			if let Err(e) = std::fs::rename(staging.join(f), prefix.join(f)) {
				log::error!("Failed to restore {}: {}", prefix.join(f).display(), e);
			}
		}
	}
}

impl Deployment for HardLinkDeployment {
	fn linked(&self, prefix: &Path) -> Result<BTreeSet<Dist>, DeploymentError> {
		let mut linked = BTreeSet::<Dist>::new();
		let meta_dir = prefix.join(META_DIR);
		if !meta_dir.is_dir() {
			return Ok(linked)
		}
		for entry in meta_dir.read_dir()? {
			let path = entry?.path();
			let stem = match path.file_name().and_then(|n| n.to_str()).and_then(|n| n.strip_suffix(".json")) {
				Some(stem) => stem,
				None => continue,
			};
			match Dist::new(stem) {
				Ok(dist) => { linked.insert(dist); },
				Err(e) => log::warn!("Ignoring unrecognised link record {}: {}", path.display(), e),
			}
		}
		Ok(linked)
	}

	fn link(&self, pkgs_dir: &Path, prefix: &Path, dist: &Dist) -> Result<(), DeploymentError> {
		log::trace!("Deploying package {} to {}", dist, prefix.display());
		let content_dir = content::get_package_content_path(pkgs_dir, dist);
		if !content_dir.is_dir() {
			return Err(DeploymentError::MissingContent(dist.clone()))
		}

		let instructions = Self::get_install_instructions(&content_dir)?;
		let mut placed = Vec::<PathBuf>::with_capacity(instructions.len());
		for (source, destination) in instructions {
			if let Err(e) = Self::place_file(&source, &prefix.join(&destination)) {
				log::warn!("Failed to deploy {}, removing {} placed file(s)", dist, placed.len());
				if let Err(cleanup) = Self::remove_files(prefix, &placed) {
					log::error!("Failed to clean up after {}: {}", dist, cleanup);
				}
				return Err(e.into())
			}
			placed.push(destination);
		}

		let record_path = get_link_record_path(prefix, dist);
		let write_record = || -> Result<(), DeploymentError> {
			std::fs::create_dir_all(prefix.join(META_DIR))?;
			let file = std::fs::File::create(&record_path)?;
			serde_json::to_writer_pretty(file, &LinkRecord { dist: dist.clone(), files: placed.clone() })?;
			Ok(())
		};
		if let Err(e) = write_record() {
			let _ = std::fs::remove_file(&record_path);
			if let Err(cleanup) = Self::remove_files(prefix, &placed) {
				log::error!("Failed to clean up after {}: {}", dist, cleanup);
			}
			return Err(e)
		}
		Ok(())
	}

	fn unlink(&self, prefix: &Path, dist: &Dist) -> Result<(), DeploymentError> {
		log::trace!("Removing package {} from {}", dist, prefix.display());
		let record_path = get_link_record_path(prefix, dist);
		if !record_path.is_file() {
			return Err(DeploymentError::NotLinked(dist.clone()))
		}
		let record: LinkRecord = serde_json::from_reader(std::io::BufReader::new(std::fs::File::open(&record_path)?))?;

		/* Files are moved aside first and only deleted once the record is gone */
		let staging = get_staging_path(prefix, dist);
		if staging.exists() {
			std::fs::remove_dir_all(&staging)?;
		}
		let mut staged = Vec::<PathBuf>::with_capacity(record.files.len());
		for f in &record.files {
			match Self::stage_file(prefix, &staging, f) {
				Ok(true) => staged.push(f.clone()),
				Ok(false) => {},
				Err(e) => {
					log::warn!("Failed to remove {}, restoring {} staged file(s)", dist, staged.len());
					Self::restore_staged(prefix, &staging, &staged);
					return Err(e.into())
				},
			}
		}
		if let Err(e) = std::fs::remove_file(&record_path) {
			Self::restore_staged(prefix, &staging, &staged);
			return Err(e.into())
		}

		if let Err(e) = std::fs::remove_dir_all(&staging) {
			if e.kind() != std::io::ErrorKind::NotFound {
				log::warn!("Failed to delete staged files of {}: {}", dist, e);
			}
		}
		if let Err(e) = Self::remove_empty_dirs(prefix, &record.files) {
			log::warn!("Failed to remove empty directories of {}: {}", dist, e);
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn make_content(pkgs_dir: &Path, dist: &Dist, files: &[(&str, &str)]) {
		let dir = content::get_package_content_path(pkgs_dir, dist);
		for (name, data) in files {
			let path = dir.join(name);
			std::fs::create_dir_all(path.parent().unwrap()).unwrap();
			std::fs::write(path, data).unwrap();
		}
	}

	#[test]
	fn link_then_unlink() {
		let pkgs = tempfile::tempdir().unwrap();
		let prefix = tempfile::tempdir().unwrap();
		let dist = Dist::new("pkgA-1.0-0").unwrap();
		make_content(pkgs.path(), &dist, &[("bin/a", "a"), ("lib/deep/a.so", "so"), ("info/index.json", "{}")]);

		let deployment = HardLinkDeployment;
		deployment.link(pkgs.path(), prefix.path(), &dist).unwrap();
		assert_eq!(std::fs::read_to_string(prefix.path().join("bin/a")).unwrap(), "a");
		assert!(prefix.path().join("lib/deep/a.so").is_file());
		assert!(!prefix.path().join("info").exists());
		assert_eq!(deployment.linked(prefix.path()).unwrap(), BTreeSet::from([dist.clone()]));

		std::fs::write(prefix.path().join("bin/user-file"), "keep").unwrap();
		deployment.unlink(prefix.path(), &dist).unwrap();
		assert!(!prefix.path().join("bin/a").exists());
		assert!(prefix.path().join("bin/user-file").exists());
		assert!(!prefix.path().join("lib").exists());
		assert!(deployment.linked(prefix.path()).unwrap().is_empty());
	}

	#[test]
	fn failed_unlink_keeps_package_linked() {
		let pkgs = tempfile::tempdir().unwrap();
		let prefix = tempfile::tempdir().unwrap();
		let dist = Dist::new("pkgA-1.0-0").unwrap();
		make_content(pkgs.path(), &dist, &[("bin/a", "a"), ("share/z/inner", "z")]);

		let deployment = HardLinkDeployment;
		deployment.link(pkgs.path(), prefix.path(), &dist).unwrap();

		/* Listing the directory after its contents makes it impossible to move aside */
		let record = LinkRecord {
			dist: dist.clone(),
			files: vec![PathBuf::from("bin/a"), PathBuf::from("share/z/inner"), PathBuf::from("share/z")],
		};
		std::fs::write(get_link_record_path(prefix.path(), &dist), serde_json::to_string(&record).unwrap()).unwrap();

		assert!(deployment.unlink(prefix.path(), &dist).is_err());
		assert_eq!(deployment.linked(prefix.path()).unwrap(), BTreeSet::from([dist.clone()]));
		assert_eq!(std::fs::read_to_string(prefix.path().join("bin/a")).unwrap(), "a");
		assert_eq!(std::fs::read_to_string(prefix.path().join("share/z/inner")).unwrap(), "z");
	}

	#[test]
	fn link_requires_content() {
		let pkgs = tempfile::tempdir().unwrap();
		let prefix = tempfile::tempdir().unwrap();
		let dist = Dist::new("pkgA-1.0-0").unwrap();
		assert!(matches!(HardLinkDeployment.link(pkgs.path(), prefix.path(), &dist), Err(DeploymentError::MissingContent(_))));
		assert!(matches!(HardLinkDeployment.unlink(prefix.path(), &dist), Err(DeploymentError::NotLinked(_))));
	}
}
