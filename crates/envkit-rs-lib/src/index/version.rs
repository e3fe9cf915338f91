use serde::{Serialize, Deserialize};

use super::ParseError;

/// A package version string with the ordering used to pick the newest build.
///
/// The string is split on `.`, `-` and `_` and again wherever digits meet letters.
/// Numeric segments compare as numbers, alphabetic segments compare lexically
/// and a numeric segment outranks an alphabetic one in the same position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageVersion {
	version: String,
	segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
	/// Digits with leading zeros removed.
	Numeric(String),
	Alpha(String),
}

impl PackageVersion {
	pub fn new(version: &str) -> Result<Self, ParseError> {
		let version = version.trim();
		if version.is_empty() || version.contains(char::is_whitespace) {
			return Err(ParseError::InvalidVersion(version.to_string()))
		}

		Ok(PackageVersion {
			version: version.to_string(),
			segments: split_segments(version),
		})
	}

	pub fn as_str(&self) -> &str {
		&self.version
	}
}

fn split_segments(version: &str) -> Vec<Segment> {
	let mut segments = Vec::<Segment>::new();

	for part in version.split(&['.', '-', '_'][..]) {
		let mut rest = part;
		while let Some(first) = rest.chars().next() {
			let numeric = first.is_ascii_digit();
			let end = rest.find(|c: char| c.is_ascii_digit() != numeric).unwrap_or(rest.len());
			let (run, tail) = rest.split_at(end);
			if numeric {
				let trimmed = run.trim_start_matches('0');
				segments.push(Segment::Numeric(trimmed.to_string()));
			} else {
				segments.push(Segment::Alpha(run.to_string()));
			}
			rest = tail;
		}
	}

	segments
}

impl Ord for Segment {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		use std::cmp::Ordering;
		match (self, other) {
			/* No leading zeros so the longer string is the larger number */
			(Segment::Numeric(a), Segment::Numeric(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
			(Segment::Alpha(a), Segment::Alpha(b)) => a.cmp(b),
			(Segment::Numeric(_), Segment::Alpha(_)) => Ordering::Greater,
			(Segment::Alpha(_), Segment::Numeric(_)) => Ordering::Less,
		}
	}
}

impl PartialOrd for Segment {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for PackageVersion {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		/* Slice ordering already puts a prefix before the longer version */
		self.segments.cmp(&other.segments)
			.then_with(|| self.version.cmp(&other.version))
	}
}

impl PartialOrd for PackageVersion {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl TryFrom<String> for PackageVersion {
	type Error = ParseError;
	fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(&value) }
}

impl TryFrom<&str> for PackageVersion {
	type Error = ParseError;
	fn try_from(value: &str) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<PackageVersion> for String {
	fn from(value: PackageVersion) -> Self {
		value.version
	}
}

impl std::str::FromStr for PackageVersion {
	type Err = ParseError;
	fn from_str(s: &str) -> Result<Self, Self::Err> { Self::new(s) }
}

impl std::fmt::Display for PackageVersion {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.version)
	}
}
