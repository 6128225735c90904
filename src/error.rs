//! Error types shared by the access, package, and bridge layers.
//!
//! Each concern has its own enum so callers can match on what actually went
//! wrong: a read miss is recoverable, a confinement violation never is, and a
//! failed pull is transient.

use std::time::Duration;

use thiserror::Error;

use crate::package::PackageSpec;
use crate::path::VirtualPath;

/// Result type for synchronous access model reads.
pub type AccessResult<T> = Result<T, AccessError>;

/// A path that would escape its mount root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("path `{path}` {reason}")]
pub struct ConfinementError {
    /// The offending input, as given.
    pub path: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl ConfinementError {
    pub(crate) fn new(path: impl Into<String>, reason: &'static str) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }
}

/// Failure of a synchronous read against an access model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The content is not resident. Warm and retry.
    #[error("file not found: {0}")]
    NotFound(VirtualPath),

    /// The path escapes the mount root.
    #[error(transparent)]
    Confinement(#[from] ConfinementError),
}

impl AccessError {
    /// Whether this is a recoverable read miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Failure reported by a [`Transport`](crate::package::Transport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The target definitively does not exist (HTTP 404 or equivalent).
    #[error("{target} does not exist")]
    NotFound {
        /// The requested target.
        target: String,
    },

    /// The remote answered with an unexpected status.
    #[error("{target} answered with status {status}")]
    Status {
        /// The requested target.
        target: String,
        /// The status code.
        status: u16,
    },

    /// Connection-level failure.
    #[error("network failure: {0}")]
    Network(String),

    /// The request did not finish in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// Whether the remote confirmed the target is absent.
    pub fn is_definitive_absence(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failure to resolve a package through the registry.
///
/// All variants are transient from the registry's point of view: nothing is
/// cached, and a later `resolve` tries again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The transport could not deliver the bundle.
    #[error("package {spec} is unavailable: {source}")]
    Unavailable {
        /// The package that failed.
        spec: PackageSpec,
        /// The transport failure.
        #[source]
        source: TransportError,
    },

    /// The bundle could not be decoded.
    #[error("package {spec} has a malformed archive: {reason}")]
    Malformed {
        /// The package that failed.
        spec: PackageSpec,
        /// What was wrong with the archive.
        reason: String,
    },

    /// The pull exceeded the configured timeout.
    #[error("pulling package {spec} timed out after {after:?}")]
    Timeout {
        /// The package that failed.
        spec: PackageSpec,
        /// The configured limit.
        after: Duration,
    },

    /// The spec maps to a path outside the packages root.
    #[error(transparent)]
    Confinement(#[from] ConfinementError),
}

/// Failure of an asynchronous warm step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarmError {
    /// Fetching a plain file failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Resolving a package failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The warm target escapes the mount root.
    #[error(transparent)]
    Confinement(#[from] ConfinementError),
}

/// Terminal outcome of a bridged compile.
#[derive(Debug, Error)]
pub enum BridgeError<E> {
    /// The retry bound was reached while the engine still reported misses.
    #[error("missing resources after {attempts} attempts: {}", join_paths(paths))]
    MissingResources {
        /// Paths the last attempt could not read.
        paths: Vec<VirtualPath>,
        /// Number of compile attempts made.
        attempts: usize,
    },

    /// The engine failed for reasons other than missing files.
    #[error("{0}")]
    Compile(E),
}

impl<E> BridgeError<E> {
    /// The missing paths, if this is a missing-resource error.
    pub fn missing_paths(&self) -> Option<&[VirtualPath]> {
        match self {
            Self::MissingResources { paths, .. } => Some(paths),
            Self::Compile(_) => None,
        }
    }
}

/// Invalid configuration input.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The input could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field has an unusable value.
    #[error("invalid configuration field `{field}`: {reason}")]
    Invalid {
        /// The field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

fn join_paths(paths: &[VirtualPath]) -> String {
    paths
        .iter()
        .map(VirtualPath::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_resources_display() {
        let err: BridgeError<String> = BridgeError::MissingResources {
            paths: vec![
                VirtualPath::new("a.typ").unwrap(),
                VirtualPath::new("img/b.png").unwrap(),
            ],
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "missing resources after 3 attempts: a.typ, img/b.png"
        );
        assert_eq!(err.missing_paths().map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_compile_variant_is_separate() {
        let err: BridgeError<String> = BridgeError::Compile("unknown variable".into());
        assert_eq!(err.to_string(), "unknown variable");
        assert!(err.missing_paths().is_none());
    }

    #[test]
    fn test_definitive_absence() {
        let absent = TransportError::NotFound {
            target: "https://x/a".into(),
        };
        assert!(absent.is_definitive_absence());
        assert!(!TransportError::Network("reset".into()).is_definitive_absence());
    }
}
