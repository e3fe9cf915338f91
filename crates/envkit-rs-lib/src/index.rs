//! # Package index
//!
//! The catalog of available package builds, keyed by distribution identifier.
//!
//! Fetching the index from a channel is done elsewhere, here it is read from the JSON mapping
//! `{ "<dist>[.tar.gz]": { "name": .., "version": .., .. } }` and can be cached to disk in a binary form.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Serialize, Deserialize};

mod dist;
pub use dist::Dist;
pub use dist::ARCHIVE_EXTENSION;

mod version;
pub use version::PackageVersion;

pub mod spec;
pub use spec::Spec;

mod record;
pub use record::PackageRecord;

/// Failures turning strings into specs, versions or identifiers.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
	#[error("empty package spec.")]
	EmptySpec,
	#[error("package spec \"{0}\" has more than three parts.")]
	TooManySpecParts(String),
	#[error("invalid character '{0}' in package name \"{1}\".")]
	InvalidCharacter(char, String),
	#[error("invalid version \"{0}\".")]
	InvalidVersion(String),
	#[error("invalid version constraint \"{0}\".")]
	InvalidVersionSpec(String),
	#[error("invalid package specification \"{0}\".")]
	InvalidPinnedArg(String),
	#[error("specification is disallowed: {0}")]
	Disallowed(String),
	#[error("\"{0}\" is not a distribution identifier of the form name-version-build.")]
	InvalidDist(String),
	#[error("index entry {0} does not match its record's name, version and build.")]
	RecordMismatch(String),
	#[error("invalid pattern: {0}")]
	Pattern(#[from] regex::Error),
}

/// Immutable mapping of distribution identifiers to their [`PackageRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
	packages: BTreeMap<Dist, PackageRecord>,
}

impl Index {
	/// Builds an index, checking every identifier agrees with its record.
	pub fn from_records(records: impl IntoIterator<Item = (Dist, PackageRecord)>) -> Result<Self, ParseError> {
		let mut packages = BTreeMap::<Dist, PackageRecord>::new();
		for (dist, record) in records {
			let (name, version, build) = dist.parts();
			if name != record.name || version != record.version.as_str() || build != record.build {
				return Err(ParseError::RecordMismatch(dist.to_string()))
			}
			packages.insert(dist, record);
		}
		Ok(Index { packages })
	}

	/// Reads the JSON mapping, keys may carry the [`ARCHIVE_EXTENSION`].
	pub fn from_json_str(json: &str) -> crate::Result<Self> {
		let raw: BTreeMap<String, PackageRecord> = serde_json::from_str(json)?;
		let mut records = Vec::<(Dist, PackageRecord)>::with_capacity(raw.len());
		for (key, mut record) in raw {
			let dist = match key.strip_suffix(ARCHIVE_EXTENSION) {
				Some(stem) => Dist::new(stem)?,
				None => Dist::new(&key)?,
			};
			if record.build.is_empty() {
				record.build = dist.parts().2.to_string();
			}
			records.push((dist, record));
		}
		let index = Self::from_records(records)?;
		log::debug!("Read index with {} packages", index.len());
		Ok(index)
	}

	/// # Errors
	/// - [`IO`](crate::Error::IO) when reading the file.
	/// - [`SerdeJSON`](crate::Error::SerdeJSON) or [`Parse`](crate::Error::Parse) for malformed contents.
	pub fn load_from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
		log::trace!("Loading index from {}", path.as_ref().display());
		let json = std::fs::read_to_string(path)?;
		Self::from_json_str(&json)
	}

	/// Loads an index previously written with [`save_to_cache()`](Index::save_to_cache()).
	pub fn load_from_cache(path: impl AsRef<Path>) -> crate::Result<Self> {
		let file = std::fs::File::open(path)?;
		Ok(bincode::deserialize_from(std::io::BufReader::new(file))?)
	}

	pub fn save_to_cache(&self, path: impl AsRef<Path>) -> crate::Result<()> {
		let path = path.as_ref();
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let file = std::fs::File::create(path)?;
		bincode::serialize_into(std::io::BufWriter::new(file), self)?;
		Ok(())
	}

	pub fn get(&self, dist: &Dist) -> Option<&PackageRecord> {
		self.packages.get(dist)
	}

	pub fn contains(&self, dist: &Dist) -> bool {
		self.packages.contains_key(dist)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&Dist, &PackageRecord)> {
		self.packages.iter()
	}

	/// Every build of the package `name`, in identifier order.
	pub fn records_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = (&'a Dist, &'a PackageRecord)> + 'a {
		self.packages.iter().filter(move |(_, r)| r.name == name)
	}

	pub fn has_name(&self, name: &str) -> bool {
		self.packages.values().any(|r| r.name == name)
	}

	/// Number of distinct package names.
	pub fn name_count(&self) -> usize {
		self.packages.values().map(|r| r.name.as_str()).collect::<BTreeSet<_>>().len()
	}

	/// A new index containing only the entries `predicate` accepts.
	pub fn filtered(&self, mut predicate: impl FnMut(&Dist, &PackageRecord) -> bool) -> Index {
		Index {
			packages: self.packages.iter()
				.filter(|(d, r)| predicate(d, r))
				.map(|(d, r)| (d.clone(), r.clone()))
				.collect()
		}
	}

	pub fn len(&self) -> usize {
		self.packages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.packages.is_empty()
	}
}
