use std::fs::File;
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// Name of the lock file inside a prefix.
pub const LOCK_FILE_NAME: &str = ".envkit.lock";

/// Exclusive hold on a prefix, released when dropped.
///
/// Only one set of actions may be applied to a prefix at a time, this holds an OS file lock
/// on [`LOCK_FILE_NAME`] for as long as the value lives.
#[derive(Debug)]
pub struct PrefixLock {
	file: File,
	path: PathBuf,
}

impl PrefixLock {
	/// Blocks until the lock for `prefix` is acquired, creating the prefix if needed.
	pub fn acquire(prefix: impl AsRef<Path>) -> std::io::Result<Self> {
		let path = Self::path_for(prefix.as_ref())?;
		let file = File::create(&path)?;
		file.lock_exclusive()?;
		log::debug!("Acquired prefix lock {}", path.display());
		Ok(Self { file, path })
	}

	/// Acquires the lock without blocking.
	///
	/// Returns `Ok(None)` when something else holds it.
	pub fn try_acquire(prefix: impl AsRef<Path>) -> std::io::Result<Option<Self>> {
		let path = Self::path_for(prefix.as_ref())?;
		let file = File::create(&path)?;
		match file.try_lock_exclusive() {
			Ok(()) => {
				log::debug!("Acquired prefix lock {}", path.display());
				Ok(Some(Self { file, path }))
			},
			Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
				log::debug!("Prefix lock {} is held elsewhere", path.display());
				Ok(None)
			},
			Err(e) => Err(e),
		}
	}

	fn path_for(prefix: &Path) -> std::io::Result<PathBuf> {
		std::fs::create_dir_all(prefix)?;
		Ok(prefix.join(LOCK_FILE_NAME))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl Drop for PrefixLock {
	fn drop(&mut self) {
		if let Err(e) = self.file.unlock() {
			log::warn!("Failed to release prefix lock {}: {}", self.path.display(), e);
		} else {
			log::debug!("Released prefix lock {}", self.path.display());
		}
	}
}
