//! Warmer implementations for the built-in caches.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::Warmer;
use crate::access::{AccessModel, NetworkAccessModel};
use crate::error::WarmError;
use crate::package::PackageRegistry;
use crate::path::VirtualPath;

#[async_trait]
impl Warmer for NetworkAccessModel {
    async fn warm(&self, path: &VirtualPath) -> Result<(), WarmError> {
        NetworkAccessModel::warm(self, path).await
    }
}

/// Resolves the package owning `path`. Paths outside the packages root
/// are ignored.
#[async_trait]
impl Warmer for PackageRegistry {
    async fn warm(&self, path: &VirtualPath) -> Result<(), WarmError> {
        match self.resolver().spec_for(path) {
            Some(spec) => self.resolve(&spec).await.map(drop).map_err(Into::into),
            None => Ok(()),
        }
    }
}

/// Routes each path to the cache that can serve it.
///
/// Paths under the registry's packages root go to the registry, everything
/// else to the network model. A path with no route is left alone. With a
/// mount attached, paths it already holds are not routed at all.
///
/// ```ignore
/// let mount = Arc::new(OverlayAccessModel::new(network.clone()));
/// let warmer = MountWarmer::new()
///     .with_mount(mount.clone())
///     .with_registry(registry)
///     .with_network(network);
/// ```
#[derive(Clone, Default)]
pub struct MountWarmer {
    mount: Option<Arc<dyn AccessModel>>,
    registry: Option<PackageRegistry>,
    network: Option<NetworkAccessModel>,
}

impl MountWarmer {
    /// A warmer with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip paths `mount` already holds.
    pub fn with_mount(mut self, mount: Arc<dyn AccessModel>) -> Self {
        self.mount = Some(mount);
        self
    }

    /// Route package paths to `registry`.
    pub fn with_registry(mut self, registry: PackageRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Route all other paths to `network`.
    pub fn with_network(mut self, network: NetworkAccessModel) -> Self {
        self.network = Some(network);
        self
    }

    /// The package route.
    pub fn registry(&self) -> Option<&PackageRegistry> {
        self.registry.as_ref()
    }
}

impl std::fmt::Debug for MountWarmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountWarmer")
            .field("mount", &self.mount.is_some())
            .field("registry", &self.registry)
            .field("network", &self.network)
            .finish()
    }
}

#[async_trait]
impl Warmer for MountWarmer {
    async fn warm(&self, path: &VirtualPath) -> Result<(), WarmError> {
        if self.mount.as_ref().is_some_and(|mount| mount.file_exists(path)) {
            debug!(%path, "already resident");
            return Ok(());
        }
        if let Some(registry) = &self.registry
            && path.starts_with(registry.resolver().cache_root())
        {
            return Warmer::warm(registry, path).await;
        }
        match &self.network {
            Some(network) => network.warm(path).await,
            None => {
                debug!(%path, "no warm route");
                Ok(())
            }
        }
    }
}
