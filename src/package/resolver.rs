//! Pure mapping between package specs, mount paths, and fetch targets.

use crate::config::AccessConfig;
use crate::error::{ConfigError, ConfinementError};
use crate::path::VirtualPath;

use super::spec::PackageSpec;

/// Maps a [`PackageSpec`] to its canonical mount path and remote target.
///
/// The mount layout is `{cache_root}/{namespace}/{name}-{version}/`. The
/// mapping is injective because the version suffix always consists of three
/// numeric components, so the last `-` before it splits name and version
/// unambiguously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    cache_root: VirtualPath,
    base: String,
    template: String,
}

impl PathResolver {
    /// Create a resolver from configuration.
    pub fn new(config: &AccessConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            cache_root: config.cache_root_path()?,
            base: config.registry_url.clone(),
            template: config.url_template.clone(),
        })
    }

    /// The directory packages are materialized under.
    pub fn cache_root(&self) -> &VirtualPath {
        &self.cache_root
    }

    /// Canonical mount path of a package root (with trailing slash).
    pub fn resolve_path(&self, spec: &PackageSpec) -> Result<VirtualPath, ConfinementError> {
        let namespace = segment(spec.namespace())?;
        let name = segment(spec.name())?;
        self.cache_root
            .join(format!("{namespace}/{name}-{}/", spec.version()))
    }

    /// Remote location of the package bundle.
    pub fn target(&self, spec: &PackageSpec) -> Result<String, ConfinementError> {
        let namespace = segment(spec.namespace())?;
        let name = segment(spec.name())?;
        Ok(self
            .template
            .replace("{base}", &self.base)
            .replace("{namespace}", namespace)
            .replace("{name}", name)
            .replace("{version}", &spec.version().to_string()))
    }

    /// The package a mount path belongs to, if it lies below the cache root.
    pub fn spec_for(&self, path: &VirtualPath) -> Option<PackageSpec> {
        let rest = path.strip_prefix(&self.cache_root)?;
        let mut parts = rest.splitn(3, '/');
        let namespace = parts.next().filter(|ns| !ns.is_empty())?;
        let (name, version) = parts.next()?.rsplit_once('-')?;
        if name.is_empty() {
            return None;
        }
        Some(PackageSpec::new(namespace, name, version.parse().ok()?))
    }
}

/// Accept a spec field only if it is one plain path segment.
fn segment(value: &str) -> Result<&str, ConfinementError> {
    let reason = if value.is_empty() {
        "is empty"
    } else if value == "." || value == ".." {
        "escapes the packages root"
    } else if value.contains(['/', '\\', '\0', ':']) {
        "is not a single path segment"
    } else {
        return Ok(value);
    };
    Err(ConfinementError::new(value, reason))
}
