//! Package specs, the textual `name [version] [build]` constraints used for requests and dependencies.

use serde::{Serialize, Deserialize};

use super::{Dist, PackageRecord, PackageVersion, ParseError};

/// Characters which can never appear in a package name.
const INVALID_NAME_CHARS: &str = " !@#$%^&*()[]{}|<>?";

/// A constraint selecting one or more builds of a single package name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Spec {
	name: String,
	version: Option<VersionSpec>,
	build: Option<BuildSpec>,
}

impl Spec {
	/// Parses a whitespace separated `name [version] [build]` string.
	pub fn new(spec: &str) -> Result<Self, ParseError> {
		let parts: Vec<&str> = spec.split_whitespace().collect();
		match parts.as_slice() {
			[] => Err(ParseError::EmptySpec),
			[name] => Ok(Spec { name: validate_name(name)?, version: None, build: None }),
			[name, version] => Ok(Spec {
				name: validate_name(name)?,
				version: Some(VersionSpec::new(version)?),
				build: None,
			}),
			[name, version, build] => Ok(Spec {
				name: validate_name(name)?,
				version: Some(VersionSpec::new(version)?),
				build: Some(BuildSpec::new(build)?),
			}),
			_ => Err(ParseError::TooManySpecParts(spec.to_string())),
		}
	}

	/// Parses the `name[=version[=build]]` argument form.
	///
	/// A version given this way is a prefix, `1.2` selects `1.2*`.
	/// A version ending in `.0` also selects the shorter form, `1.0` selects `1|1.0*`.
	pub fn from_pinned_arg(arg: &str) -> Result<Self, ParseError> {
		let parts: Vec<&str> = arg.trim().split('=').collect();
		if parts.iter().any(|p| p.is_empty()) {
			return Err(ParseError::InvalidPinnedArg(arg.to_string()))
		}
		let name = parts[0].to_lowercase();
		match parts.len() {
			1 => Self::new(&name),
			2 => {
				let version = parts[1];
				if let Some(short) = version.strip_suffix(".0") {
					Self::new(&format!("{name} {short}|{version}*"))
				} else {
					Self::new(&format!("{name} {version}*"))
				}
			},
			3 => Self::new(&format!("{} {} {}", name, parts[1], parts[2])),
			_ => Err(ParseError::InvalidPinnedArg(arg.to_string())),
		}
	}

	/// The exact spec selecting a single distribution.
	pub fn from_dist(dist: &Dist) -> Result<Self, ParseError> {
		let (name, version, build) = dist.parts();
		Self::new(&format!("{name} {version} {build}"))
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn version(&self) -> Option<&VersionSpec> {
		self.version.as_ref()
	}

	pub fn build(&self) -> Option<&BuildSpec> {
		self.build.as_ref()
	}

	pub fn matches(&self, name: &str, version: &PackageVersion, build: &str) -> bool {
		if self.name != name {
			return false
		}
		if let Some(vs) = &self.version {
			if !vs.matches(version) { return false }
		}
		if let Some(bs) = &self.build {
			if !bs.matches(build) { return false }
		}
		true
	}

	pub fn matches_record(&self, record: &PackageRecord) -> bool {
		self.matches(&record.name, &record.version, &record.build)
	}

	/// Matches using only the identifier, for when no [`PackageRecord`] is at hand.
	pub fn matches_dist(&self, dist: &Dist) -> bool {
		let (name, version, build) = dist.parts();
		match PackageVersion::new(version) {
			Ok(version) => self.matches(name, &version, build),
			Err(_) => false,
		}
	}
}

fn validate_name(name: &str) -> Result<String, ParseError> {
	if let Some(c) = name.chars().find(|c| INVALID_NAME_CHARS.contains(*c)) {
		return Err(ParseError::InvalidCharacter(c, name.to_string()))
	}
	Ok(name.to_string())
}

impl TryFrom<String> for Spec {
	type Error = ParseError;
	fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(&value) }
}

impl TryFrom<&str> for Spec {
	type Error = ParseError;
	fn try_from(value: &str) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Spec> for String {
	fn from(value: Spec) -> Self {
		value.to_string()
	}
}

impl std::str::FromStr for Spec {
	type Err = ParseError;
	fn from_str(s: &str) -> Result<Self, Self::Err> { Self::new(s) }
}

impl std::fmt::Display for Spec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.name)?;
		if let Some(v) = &self.version {
			write!(f, " {}", v.raw)?;
		}
		if let Some(b) = &self.build {
			write!(f, " {}", b.raw)?;
		}
		Ok(())
	}
}

/* Version constraints */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
	Ge,
	Le,
	Gt,
	Lt,
	Eq,
	Ne,
}

impl Operator {
	/// Longer operators first so `>=` is not read as `>`.
	const ALL: [(&'static str, Operator); 6] = [
		(">=", Operator::Ge),
		("<=", Operator::Le),
		("==", Operator::Eq),
		("!=", Operator::Ne),
		(">", Operator::Gt),
		("<", Operator::Lt),
	];
}

#[derive(Debug, Clone)]
enum VersionTerm {
	Compare(Operator, PackageVersion),
	Glob(regex::Regex),
	Exact(String),
}

impl VersionTerm {
	fn new(term: &str) -> Result<Self, ParseError> {
		for (prefix, op) in Operator::ALL {
			if let Some(v) = term.strip_prefix(prefix) {
				return Ok(VersionTerm::Compare(op, PackageVersion::new(v)?))
			}
		}
		if term.contains('*') {
			Ok(VersionTerm::Glob(glob_to_regex(term)?))
		} else {
			Ok(VersionTerm::Exact(term.to_string()))
		}
	}

	fn matches(&self, version: &PackageVersion) -> bool {
		match self {
			VersionTerm::Compare(op, v) => match op {
				Operator::Ge => version >= v,
				Operator::Le => version <= v,
				Operator::Gt => version > v,
				Operator::Lt => version < v,
				Operator::Eq => version == v,
				Operator::Ne => version != v,
			},
			VersionTerm::Glob(re) => re.is_match(version.as_str()),
			VersionTerm::Exact(s) => version.as_str() == s,
		}
	}
}

/// The version part of a [`Spec`].
///
/// `|` separates alternatives and `,` joins terms which must all hold,
/// so `>=1.0,<2.0|3.0*` selects either a 1.x version or anything starting with `3.0`.
#[derive(Debug, Clone)]
pub struct VersionSpec {
	raw: String,
	alternatives: Vec<Vec<VersionTerm>>,
}

impl VersionSpec {
	pub fn new(spec: &str) -> Result<Self, ParseError> {
		let mut alternatives = Vec::<Vec<VersionTerm>>::new();
		for alternative in spec.split('|') {
			let mut terms = Vec::<VersionTerm>::new();
			for term in alternative.split(',') {
				let term = term.trim();
				if term.is_empty() {
					return Err(ParseError::InvalidVersionSpec(spec.to_string()))
				}
				terms.push(VersionTerm::new(term)?);
			}
			alternatives.push(terms);
		}
		Ok(VersionSpec { raw: spec.to_string(), alternatives })
	}

	pub fn matches(&self, version: &PackageVersion) -> bool {
		self.alternatives.iter().any(|terms| terms.iter().all(|t| t.matches(version)))
	}

	pub fn as_str(&self) -> &str {
		&self.raw
	}
}

impl PartialEq for VersionSpec {
	fn eq(&self, other: &Self) -> bool {
		self.raw == other.raw
	}
}

impl Eq for VersionSpec {}

impl std::hash::Hash for VersionSpec {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.raw.hash(state);
	}
}

/// The build string part of a [`Spec`], either exact or a `*` glob.
#[derive(Debug, Clone)]
pub struct BuildSpec {
	raw: String,
	glob: Option<regex::Regex>,
}

impl BuildSpec {
	pub fn new(spec: &str) -> Result<Self, ParseError> {
		let glob = if spec.contains('*') { Some(glob_to_regex(spec)?) } else { None };
		Ok(BuildSpec { raw: spec.to_string(), glob })
	}

	pub fn matches(&self, build: &str) -> bool {
		match &self.glob {
			Some(re) => re.is_match(build),
			None => self.raw == build,
		}
	}

	pub fn as_str(&self) -> &str {
		&self.raw
	}
}

impl PartialEq for BuildSpec {
	fn eq(&self, other: &Self) -> bool {
		self.raw == other.raw
	}
}

impl Eq for BuildSpec {}

impl std::hash::Hash for BuildSpec {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.raw.hash(state);
	}
}

fn glob_to_regex(glob: &str) -> Result<regex::Regex, ParseError> {
	let pattern = glob.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
	Ok(regex::Regex::new(&format!("^{pattern}$"))?)
}
