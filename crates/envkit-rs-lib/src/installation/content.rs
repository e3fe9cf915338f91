//! Package archive extraction.

use std::path::{Path, PathBuf};

use crate::index::Dist;

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
	/// There is no archive to extract.
	#[error("package archive {0} is missing.")]
	MissingArchive(PathBuf),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
}

/// Where the archive for `dist` is stored in `pkgs_dir`.
pub fn get_package_archive_path(pkgs_dir: &Path, dist: &Dist) -> PathBuf {
	pkgs_dir.join(dist.filename())
}

/// Where the extracted contents of `dist` live in `pkgs_dir`.
pub fn get_package_content_path(pkgs_dir: &Path, dist: &Dist) -> PathBuf {
	pkgs_dir.join(dist.as_str())
}

/// A package is usable once its contents are extracted, the archive itself may have been cleaned up.
pub fn is_extracted(pkgs_dir: &Path, dist: &Dist) -> bool {
	get_package_content_path(pkgs_dir, dist).is_dir()
}

/// Extracts the archive of `dist` in `pkgs_dir`, replacing any previous contents.
///
/// Extraction happens in a `.partial` directory which is only renamed into place once complete,
/// so a failure never leaves a half extracted package looking fetched.
pub fn extract_package_content(pkgs_dir: &Path, dist: &Dist) -> Result<PathBuf, ContentError> {
	let archive_path = get_package_archive_path(pkgs_dir, dist);
	if !archive_path.is_file() {
		return Err(ContentError::MissingArchive(archive_path))
	}

	let content_path = get_package_content_path(pkgs_dir, dist);
	let partial_path = pkgs_dir.join(format!("{}.partial", dist));
	if partial_path.exists() {
		std::fs::remove_dir_all(&partial_path)?;
	}
	std::fs::create_dir_all(&partial_path)?;

	log::trace!("Extracting {} to {}", archive_path.display(), partial_path.display());
	let unpacked = std::fs::File::open(&archive_path).and_then(|f| {
		let gz = flate2::read::GzDecoder::new(std::io::BufReader::new(f));
		tar::Archive::new(gz).unpack(&partial_path)
	});
	if let Err(e) = unpacked {
		let _ = std::fs::remove_dir_all(&partial_path);
		return Err(e.into())
	}

	if content_path.exists() {
		std::fs::remove_dir_all(&content_path)?;
	}
	std::fs::rename(&partial_path, &content_path)?;
	Ok(content_path)
}

#[cfg(test)]
mod test {
	use super::*;

	fn write_archive(path: &Path, files: &[(&str, &str)]) {
		let file = std::fs::File::create(path).unwrap();
		let gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
		let mut builder = tar::Builder::new(gz);
		for (name, content) in files {
			let mut header = tar::Header::new_gnu();
			header.set_size(content.len() as u64);
			header.set_mode(0o644);
			header.set_cksum();
			builder.append_data(&mut header, name, content.as_bytes()).unwrap();
		}
		builder.into_inner().unwrap().finish().unwrap();
	}

	#[test]
	fn extracts_into_content_dir() {
		let dir = tempfile::tempdir().unwrap();
		let dist = Dist::new("pkgA-1.0-0").unwrap();
		write_archive(&get_package_archive_path(dir.path(), &dist), &[("bin/a", "#!/bin/sh"), ("info/index.json", "{}")]);

		assert!(!is_extracted(dir.path(), &dist));
		let content = extract_package_content(dir.path(), &dist).unwrap();
		assert!(is_extracted(dir.path(), &dist));
		assert_eq!(std::fs::read_to_string(content.join("bin/a")).unwrap(), "#!/bin/sh");
		assert!(!dir.path().join("pkgA-1.0-0.partial").exists());
	}

	#[test]
	fn corrupt_archive_leaves_nothing_behind() {
		let dir = tempfile::tempdir().unwrap();
		let dist = Dist::new("pkgA-1.0-0").unwrap();
		std::fs::write(get_package_archive_path(dir.path(), &dist), b"not gzip").unwrap();

		assert!(matches!(extract_package_content(dir.path(), &dist), Err(ContentError::IO(_))));
		assert!(!is_extracted(dir.path(), &dist));
		assert!(!dir.path().join("pkgA-1.0-0.partial").exists());
	}

	#[test]
	fn missing_archive() {
		let dir = tempfile::tempdir().unwrap();
		let dist = Dist::new("pkgA-1.0-0").unwrap();
		assert!(matches!(extract_package_content(dir.path(), &dist), Err(ContentError::MissingArchive(_))));
	}
}
