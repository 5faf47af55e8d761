//! Schema version specifiers attached to rules.

use std::fmt;

use semver::{Version, VersionReq};

/// Version range a rule applies to. `""`, `"*"` and `"any"` accept every
/// version; anything else uses semver requirement syntax (`>=3.39, <4`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VersionSpec {
    #[default]
    Any,
    Req(VersionReq),
}

impl VersionSpec {
    pub fn parse(spec: &str) -> Result<Self, semver::Error> {
        let spec = spec.trim();
        if spec.is_empty() || spec == "*" || spec.eq_ignore_ascii_case("any") {
            return Ok(VersionSpec::Any);
        }
        VersionReq::parse(spec).map(VersionSpec::Req)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, VersionSpec::Any)
    }

    /// An unparseable entity version only satisfies [`VersionSpec::Any`].
    pub fn matches(&self, version: &str) -> bool {
        match self {
            VersionSpec::Any => true,
            VersionSpec::Req(req) => parse_version(version).is_some_and(|v| req.matches(&v)),
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Any => write!(f, "any"),
            VersionSpec::Req(req) => write!(f, "{req}"),
        }
    }
}

/// Drop a `v` prefix and pad missing minor/patch components with zeros,
/// keeping any pre-release or build suffix (`v3.40` → `3.40.0`).
pub fn normalize_version(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix('v')
        .or_else(|| raw.strip_prefix('V'))
        .unwrap_or(raw);
    let split = raw.find(['-', '+']).unwrap_or(raw.len());
    let (core, suffix) = raw.split_at(split);

    let mut parts: Vec<&str> = core.split('.').collect();
    parts.truncate(3);
    while parts.len() < 3 {
        parts.push("0");
    }
    format!("{}{suffix}", parts.join("."))
}

pub fn parse_version(raw: &str) -> Option<Version> {
    Version::parse(&normalize_version(raw)).ok()
}
