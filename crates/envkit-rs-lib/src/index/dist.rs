use serde::{Serialize, Deserialize};

use super::ParseError;

/// File extension of a package archive, appended to a [`Dist`] to get its file name.
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// A unique identifier for a single package build, `<name>-<version>-<build>`.
///
/// Used as the key into the [`Index`](super::Index) and to record what is linked in a prefix.
/// Ordering is plain string ordering which the resolver relies on as its final tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dist(String);

impl Dist {
	pub fn new(dist: &str) -> Result<Self, ParseError> {
		let dist = dist.trim();
		let parts: Vec<&str> = dist.rsplitn(3, '-').collect();
		if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) || dist.contains(char::is_whitespace) {
			return Err(ParseError::InvalidDist(dist.to_string()))
		}
		Ok(Dist(dist.to_string()))
	}

	/// Strips [`ARCHIVE_EXTENSION`] from an archive file name before parsing.
	pub fn from_filename(filename: &str) -> Result<Self, ParseError> {
		let stem = filename.strip_suffix(ARCHIVE_EXTENSION)
			.ok_or_else(|| ParseError::InvalidDist(filename.to_string()))?;
		Self::new(stem)
	}

	/// Splits into `(name, version, build)`.
	pub fn parts(&self) -> (&str, &str, &str) {
		/* Validated in `new` so there are always three non-empty parts */
		let mut it = self.0.rsplitn(3, '-');
		let build = it.next().unwrap_or_default();
		let version = it.next().unwrap_or_default();
		let name = it.next().unwrap_or_default();
		(name, version, build)
	}

	pub fn name(&self) -> &str {
		self.parts().0
	}

	pub fn version(&self) -> &str {
		self.parts().1
	}

	pub fn build(&self) -> &str {
		self.parts().2
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn filename(&self) -> String {
		self.0.clone() + ARCHIVE_EXTENSION
	}
}

impl TryFrom<String> for Dist {
	type Error = ParseError;
	fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(&value) }
}

impl TryFrom<&str> for Dist {
	type Error = ParseError;
	fn try_from(value: &str) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Dist> for String {
	fn from(value: Dist) -> Self {
		value.0
	}
}

impl std::str::FromStr for Dist {
	type Err = ParseError;
	fn from_str(s: &str) -> Result<Self, Self::Err> { Self::new(s) }
}

impl std::fmt::Display for Dist {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl AsRef<Dist> for Dist {
	fn as_ref(&self) -> &Dist {
		self
	}
}
