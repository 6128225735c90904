//! Package identification.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// =============================================================================
// PackageVersion - Semantic Version
// =============================================================================

/// A semantic version number (major.minor.patch).
///
/// Packages use strict semantic versioning with three numeric components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageVersion {
    /// Major version number.
    pub major: u32,
    /// Minor version number.
    pub minor: u32,
    /// Patch version number.
    pub patch: u32,
}

impl PackageVersion {
    /// Create a new version.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for PackageVersion {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| SpecParseError {
            input: s.to_string(),
            reason,
        };
        let mut parts = s.split('.');
        let mut next = || -> Result<u32, SpecParseError> {
            parts
                .next()
                .ok_or_else(|| invalid("version must have three components"))?
                .parse()
                .map_err(|_| invalid("version components must be numbers"))
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid("version must have three components"));
        }
        Ok(version)
    }
}

// =============================================================================
// PackageSpec - Package Identification
// =============================================================================

/// Identifies an externally published package by namespace, name, and version.
///
/// Equality and hashing use the full `(namespace, name, version)` tuple.
/// Versions are immutable upstream, so a spec always names the same bundle.
///
/// # Example
///
/// ```
/// use typst_access::package::{PackageSpec, PackageVersion};
///
/// let spec: PackageSpec = "@preview/example:0.1.0".parse().unwrap();
/// assert_eq!(spec.namespace(), "preview");
/// assert_eq!(spec.name(), "example");
/// assert_eq!(spec.version(), PackageVersion::new(0, 1, 0));
/// assert_eq!(spec.to_string(), "@preview/example:0.1.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageSpec {
    namespace: String,
    name: String,
    version: PackageVersion,
}

impl PackageSpec {
    /// Create a spec from its parts.
    ///
    /// No path validation happens here; the resolver rejects fields that
    /// would escape the packages root.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, version: PackageVersion) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version,
        }
    }

    /// Get the package namespace (e.g., `"preview"` for `@preview/example`).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get the package name (e.g., `"example"` for `@preview/example`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the package version.
    pub fn version(&self) -> PackageVersion {
        self.version
    }

    /// Check if this package matches the given namespace, name, and version.
    pub fn matches(&self, namespace: &str, name: &str, version: PackageVersion) -> bool {
        self.namespace == namespace && self.name == name && self.version == version
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}/{}:{}", self.namespace, self.name, self.version)
    }
}

impl FromStr for PackageSpec {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| SpecParseError {
            input: s.to_string(),
            reason,
        };
        let rest = s.strip_prefix('@').ok_or_else(|| invalid("must start with `@`"))?;
        let (namespace, rest) = rest
            .split_once('/')
            .ok_or_else(|| invalid("missing `/` after the namespace"))?;
        let (name, version) = rest
            .split_once(':')
            .ok_or_else(|| invalid("missing `:` before the version"))?;
        if namespace.is_empty() || name.is_empty() {
            return Err(invalid("namespace and name must not be empty"));
        }
        let version = version.parse().map_err(|err: SpecParseError| invalid(err.reason))?;
        Ok(Self::new(namespace, name, version))
    }
}

impl From<&typst::syntax::package::PackageSpec> for PackageSpec {
    fn from(spec: &typst::syntax::package::PackageSpec) -> Self {
        Self {
            namespace: spec.namespace.as_str().to_string(),
            name: spec.name.as_str().to_string(),
            version: PackageVersion {
                major: spec.version.major,
                minor: spec.version.minor,
                patch: spec.version.patch,
            },
        }
    }
}

/// A package spec or version string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid package spec `{input}`: {reason}")]
pub struct SpecParseError {
    /// The rejected input.
    pub input: String,
    /// What was wrong with it.
    pub reason: &'static str,
}
