//! Downloads a package's archive from its channel.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::index::{Dist, PackageRecord};
use super::content;

#[derive(Debug, Error)]
pub enum DownloadError {
	/// Downloaded archive doesn't match the checksum in the record.
	#[error("checksum mismatch for {dist}: expected {expected}, got {actual}.")]
	DifferentHashes {
		dist: Dist,
		expected: String,
		actual: String,
	},
	#[error("reqwest error: {0}")]
	Reqwest(#[from] reqwest::Error),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("content error: {0}")]
	Content(#[from] content::ContentError),
}

/// Materializes package contents in a package cache directory.
pub trait Fetcher {
	/// Whether `dist` is already usable from `pkgs_dir`.
	fn is_fetched(&self, pkgs_dir: &Path, dist: &Dist) -> bool;
	/// Fetches `dist` into `pkgs_dir`.
	///
	/// On error `dist` must not appear fetched.
	fn fetch(&self, dist: &Dist, record: &PackageRecord, pkgs_dir: &Path) -> Result<(), DownloadError>;
}

/// URL of the archive for `dist` in the record's channel.
pub fn get_package_url(record: &PackageRecord, dist: &Dist) -> String {
	format!("{}/{}", record.channel.trim_end_matches('/'), dist.filename())
}

/// Fetches archives over HTTP, or straight from disk for `file://` channels, and extracts them.
#[derive(Debug, Clone)]
pub struct ChannelFetcher {
	client: reqwest::blocking::Client,
	verify_checksums: bool,
}

impl ChannelFetcher {
	pub fn new(config: &crate::Config) -> Self {
		Self::with_client(reqwest::blocking::Client::new(), config.verify_checksums())
	}

	pub fn with_client(client: reqwest::blocking::Client, verify_checksums: bool) -> Self {
		Self { client, verify_checksums }
	}

	fn download(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
		if let Some(path) = url.strip_prefix("file://") {
			log::info!("Copying package from {}", path);
			return Ok(std::fs::read(path)?)
		}

		log::info!("Downloading package from {}", url);
		let mut content = Vec::<u8>::new();
		self.client
			.get(url)
			.send()?
			.error_for_status()?
			.read_to_end(&mut content)?;
		Ok(content)
	}
}

impl Fetcher for ChannelFetcher {
	fn is_fetched(&self, pkgs_dir: &Path, dist: &Dist) -> bool {
		content::is_extracted(pkgs_dir, dist)
	}

	fn fetch(&self, dist: &Dist, record: &PackageRecord, pkgs_dir: &Path) -> Result<(), DownloadError> {
		let content = self.download(&get_package_url(record, dist))?;

		if self.verify_checksums {
			if let Some(expected) = &record.sha256 {
				let actual = sha256::digest(content.as_slice());
				if !expected.eq_ignore_ascii_case(&actual) {
					return Err(DownloadError::DifferentHashes { dist: dist.clone(), expected: expected.clone(), actual })
				}
			}
		}

		std::fs::create_dir_all(pkgs_dir)?;
		let archive_path = content::get_package_archive_path(pkgs_dir, dist);
		log::info!("Writing package download to disk: {}", dist);
		std::fs::write(&archive_path, &content)?;

		content::extract_package_content(pkgs_dir, dist)?;
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::index::PackageVersion;

	fn record(channel: &str, sha256: Option<String>) -> PackageRecord {
		PackageRecord {
			name: "pkgA".to_string(),
			version: PackageVersion::new("1.0").unwrap(),
			build: "0".to_string(),
			build_number: 0,
			depends: vec![],
			size: 0,
			channel: channel.to_string(),
			kind: None,
			icon: None,
			sha256,
		}
	}

	fn archive_bytes() -> Vec<u8> {
		let gz = flate2::write::GzEncoder::new(Vec::<u8>::new(), flate2::Compression::default());
		let mut builder = tar::Builder::new(gz);
		let mut header = tar::Header::new_gnu();
		header.set_size(5);
		header.set_mode(0o644);
		header.set_cksum();
		builder.append_data(&mut header, "lib/a.txt", "hello".as_bytes()).unwrap();
		builder.into_inner().unwrap().finish().unwrap()
	}

	#[test]
	fn package_url_joins_channel() {
		let dist = Dist::new("pkgA-1.0-0").unwrap();
		assert_eq!(get_package_url(&record("http://repo.example.com/free/", None), &dist), "http://repo.example.com/free/pkgA-1.0-0.tar.gz");
		assert_eq!(get_package_url(&record("http://repo.example.com/free", None), &dist), "http://repo.example.com/free/pkgA-1.0-0.tar.gz");
	}

	#[test]
	fn fetches_from_file_channel() {
		let channel = tempfile::tempdir().unwrap();
		let pkgs = tempfile::tempdir().unwrap();
		let dist = Dist::new("pkgA-1.0-0").unwrap();
		let bytes = archive_bytes();
		std::fs::write(channel.path().join(dist.filename()), &bytes).unwrap();

		let fetcher = ChannelFetcher::with_client(reqwest::blocking::Client::new(), true);
		let record = record(&format!("file://{}/", channel.path().display()), Some(sha256::digest(bytes.as_slice())));
		assert!(!fetcher.is_fetched(pkgs.path(), &dist));
		fetcher.fetch(&dist, &record, pkgs.path()).unwrap();
		assert!(fetcher.is_fetched(pkgs.path(), &dist));
		assert_eq!(std::fs::read_to_string(pkgs.path().join("pkgA-1.0-0/lib/a.txt")).unwrap(), "hello");
	}

	#[test]
	fn rejects_checksum_mismatch() {
		let channel = tempfile::tempdir().unwrap();
		let pkgs = tempfile::tempdir().unwrap();
		let dist = Dist::new("pkgA-1.0-0").unwrap();
		std::fs::write(channel.path().join(dist.filename()), archive_bytes()).unwrap();

		let fetcher = ChannelFetcher::with_client(reqwest::blocking::Client::new(), true);
		let record = record(&format!("file://{}", channel.path().display()), Some("00".repeat(32)));
		assert!(matches!(fetcher.fetch(&dist, &record, pkgs.path()), Err(DownloadError::DifferentHashes { .. })));
		assert!(!fetcher.is_fetched(pkgs.path(), &dist));
	}
}
