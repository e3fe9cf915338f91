use serde::{Serialize, Deserialize};

use super::{PackageVersion, Spec};

/// Metadata for one package build in the [`Index`](super::Index).
///
/// The distribution identifier is not stored here, it is the key the record is indexed by.
/* NOTE: Every field is serialized, even when `None`, so the same derive works for the JSON index and the bincode cache. */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
	pub name: String,
	pub version: PackageVersion,
	/// Build string, the last segment of the identifier.
	///
	/// Optional in the JSON index where the key already carries it.
	#[serde(default)]
	pub build: String,
	/// Tie-break between builds of the same version.
	#[serde(default)]
	pub build_number: u64,
	#[serde(default)]
	pub depends: Vec<Spec>,
	/// Archive size in bytes.
	#[serde(default)]
	pub size: u64,
	/// URL of the channel the package archive lives in.
	pub channel: String,
	/// Optional type tag, applications are tagged `"app"`.
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
	/// File name of the icon for application packages.
	#[serde(default)]
	pub icon: Option<String>,
	/// Hex encoded sha256 of the archive.
	#[serde(default)]
	pub sha256: Option<String>,
}

impl PackageRecord {
	pub fn is_app(&self) -> bool {
		self.kind.as_deref() == Some("app")
	}
}
