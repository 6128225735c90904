//! On-demand package materialization.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use super::archive;
use super::resolver::PathResolver;
use super::spec::PackageSpec;
use super::transport::Transport;
use crate::access::WritableAccessModel;
use crate::config::AccessConfig;
use crate::error::{ConfigError, RegistryError};
use crate::inflight::{InFlight, bounded};
use crate::path::VirtualPath;

/// Manifest every package bundle carries at its root.
const MANIFEST: &str = "typst.toml";

/// Resolves package specs to mount paths, pulling bundles on demand.
///
/// Cloning is cheap and clones share the ready set and the in-flight table,
/// so one registry can serve any number of concurrent compile sessions.
///
/// # Example
///
/// ```ignore
/// let registry = PackageRegistry::new(&config, mount.clone(), transport)?;
/// let spec = "@preview/example:0.1.0".parse()?;
/// let root = registry.resolve(&spec).await?;
/// assert_eq!(root.as_str(), "packages/preview/example-0.1.0/");
/// ```
#[derive(Clone)]
pub struct PackageRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    resolver: PathResolver,
    mount: Arc<dyn WritableAccessModel>,
    transport: Arc<dyn Transport>,
    timeout: Option<Duration>,
    /// Committed specs, keyed to the file their batch wrote last. A spec
    /// whose marker has left the mount is stale and gets pulled again.
    ready: RwLock<FxHashMap<PackageSpec, Option<VirtualPath>>>,
    in_flight: InFlight<PackageSpec, Result<VirtualPath, RegistryError>>,
}

impl PackageRegistry {
    /// Create a registry that materializes packages into `mount`.
    pub fn new(
        config: &AccessConfig,
        mount: Arc<dyn WritableAccessModel>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: Arc::new(RegistryInner {
                resolver: PathResolver::new(config)?,
                mount,
                transport,
                timeout: config.warm_timeout,
                ready: RwLock::new(FxHashMap::default()),
                in_flight: InFlight::new(),
            }),
        })
    }

    /// The path mapping used by this registry.
    pub fn resolver(&self) -> &PathResolver {
        &self.inner.resolver
    }

    /// The mount packages are committed to.
    pub fn mount(&self) -> &Arc<dyn WritableAccessModel> {
        &self.inner.mount
    }

    /// Resolve `spec` to its package root, pulling it if necessary.
    ///
    /// Callers that arrive while a pull for the same spec is running wait for
    /// that pull and observe its outcome. A failure is returned to every
    /// waiting caller and then forgotten.
    pub async fn resolve(&self, spec: &PackageSpec) -> Result<VirtualPath, RegistryError> {
        let root = self.inner.resolver.resolve_path(spec).inspect_err(|err| {
            warn!(package = %spec, error = %err, "rejected package spec");
        })?;

        if self.is_resolved(spec) {
            debug!(package = %spec, "package cache hit");
            return Ok(root);
        }

        let registry = self.clone();
        let key = spec.clone();
        self.inner
            .in_flight
            .run(spec.clone(), move || async move {
                registry.pull_and_commit(&key, root).await
            })
            .await
    }

    /// Drive [`resolve`](Self::resolve) to completion on the calling thread.
    ///
    /// Meant for hosts without an async runtime. Pair it with a
    /// [`BlockingTransport`](super::BlockingTransport) so the fetch runs
    /// inline.
    pub fn resolve_blocking(&self, spec: &PackageSpec) -> Result<VirtualPath, RegistryError> {
        futures::executor::block_on(self.resolve(spec))
    }

    /// Whether `spec` is committed to the mount.
    ///
    /// A spec stops being resolved once the host removes its files, for
    /// example by clearing the mount.
    pub fn is_resolved(&self, spec: &PackageSpec) -> bool {
        let marker = self.inner.ready.read().get(spec).cloned();
        match marker {
            Some(None) => return true,
            Some(Some(marker)) if self.inner.mount.file_exists(&marker) => return true,
            Some(Some(marker)) => {
                debug!(package = %spec, %marker, "package left the mount");
                self.inner.ready.write().remove(spec);
            }
            None => {}
        }

        // Packages the host mounted directly count as resolved once their
        // manifest is present.
        let manifest = self
            .inner
            .resolver
            .resolve_path(spec)
            .and_then(|root| root.join(MANIFEST))
            .ok()
            .filter(|manifest| self.inner.mount.file_exists(manifest));
        match manifest {
            Some(manifest) => {
                self.inner.ready.write().insert(spec.clone(), Some(manifest));
                true
            }
            None => false,
        }
    }

    /// All resolved specs, sorted.
    pub fn resolved(&self) -> Vec<PackageSpec> {
        let known: Vec<_> = self.inner.ready.read().keys().cloned().collect();
        let mut specs: Vec<_> = known.into_iter().filter(|spec| self.is_resolved(spec)).collect();
        specs.sort();
        specs
    }

    /// Fetch the raw bundle for `spec` through the transport.
    ///
    /// Nothing is cached; calling this twice fetches twice.
    pub async fn pull_package_data(&self, spec: &PackageSpec) -> Result<Vec<u8>, RegistryError> {
        let target = self.inner.resolver.target(spec)?;
        debug!(package = %spec, %target, "pulling package");

        match bounded(self.inner.timeout, self.inner.transport.fetch(&target)).await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(source)) => {
                warn!(package = %spec, error = %source, "package pull failed");
                Err(RegistryError::Unavailable {
                    spec: spec.clone(),
                    source,
                })
            }
            Err(after) => {
                warn!(package = %spec, ?after, "package pull timed out");
                Err(RegistryError::Timeout {
                    spec: spec.clone(),
                    after,
                })
            }
        }
    }

    /// Decode `bundle` and commit its files under the package root.
    ///
    /// Every entry is validated before anything is written, and the files
    /// become visible in a single batch. The manifest is committed last, so
    /// on a mount whose batches are not atomic its presence still implies
    /// the rest of the package. On success the spec is marked resolved.
    pub fn materialize(&self, spec: &PackageSpec, bundle: &[u8]) -> Result<VirtualPath, RegistryError> {
        let root = self.inner.resolver.resolve_path(spec)?;
        let mut records = archive::unpack(&root, bundle).map_err(|reason| {
            warn!(package = %spec, %reason, "rejected package archive");
            RegistryError::Malformed {
                spec: spec.clone(),
                reason,
            }
        })?;

        let manifest = root.join(MANIFEST)?;
        records.sort_by_key(|record| record.path == manifest);
        let marker = records.last().map(|record| record.path.clone());

        let files = records.len();
        self.inner.mount.insert_batch(records);
        self.inner.ready.write().insert(spec.clone(), marker);
        info!(package = %spec, %root, files, "materialized package");
        Ok(root)
    }

    async fn pull_and_commit(&self, spec: &PackageSpec, root: VirtualPath) -> Result<VirtualPath, RegistryError> {
        // A pull that finished between the caller's check and joining the
        // table has already committed.
        if self.is_resolved(spec) {
            return Ok(root);
        }
        let bundle = self.pull_package_data(spec).await?;
        self.materialize(spec, &bundle)
    }
}

impl std::fmt::Debug for PackageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageRegistry")
            .field("resolver", &self.inner.resolver)
            .field("timeout", &self.inner.timeout)
            .field("resolved", &self.inner.ready.read().len())
            .field("in_flight", &self.inner.in_flight.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessModel, MemoryAccessModel};
    use crate::config::ConfigBuilder;
    use crate::error::TransportError;
    use crate::package::PackageVersion;
    use crate::testing::{MockTransport, bundle, gzip, malicious_bundle};

    const TARGET: &str = "https://pkgs.example/preview/example-0.1.0.tar.gz";

    fn example() -> PackageSpec {
        PackageSpec::new("preview", "example", PackageVersion::new(0, 1, 0))
    }

    fn setup(transport: &MockTransport) -> (PackageRegistry, Arc<MemoryAccessModel>) {
        setup_with(ConfigBuilder::new(), transport)
    }

    fn setup_with(builder: ConfigBuilder, transport: &MockTransport) -> (PackageRegistry, Arc<MemoryAccessModel>) {
        let config = builder.registry_url("https://pkgs.example/").build().unwrap();
        let mount = Arc::new(MemoryAccessModel::new());
        let registry = PackageRegistry::new(&config, mount.clone(), Arc::new(transport.clone())).unwrap();
        (registry, mount)
    }

    fn path(raw: &str) -> VirtualPath {
        VirtualPath::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_end_to_end() {
        let transport = MockTransport::new();
        transport.serve(
            TARGET,
            bundle(&[("lib.typ", b"#let hello = 1"), ("README.md", b"# example")]),
        );
        let (registry, mount) = setup(&transport);

        let root = registry.resolve(&example()).await.unwrap();

        assert_eq!(root.as_str(), "packages/preview/example-0.1.0/");
        let lib = path("packages/preview/example-0.1.0/lib.typ");
        assert!(mount.file_exists(&lib));
        assert_eq!(&*mount.read_file(&lib).unwrap(), b"#let hello = 1");
        assert!(mount.file_exists(&path("packages/preview/example-0.1.0/README.md")));
        assert_eq!(registry.resolved(), vec![example()]);
    }

    #[tokio::test]
    async fn test_resolve_gzip_bundle() {
        let transport = MockTransport::new();
        transport.serve(TARGET, gzip(&bundle(&[("lib.typ", b"x")])));
        let (registry, mount) = setup(&transport);

        registry.resolve(&example()).await.unwrap();
        assert!(mount.file_exists(&path("packages/preview/example-0.1.0/lib.typ")));
    }

    #[tokio::test]
    async fn test_resolve_is_deterministic() {
        let transport = MockTransport::new();
        transport.serve(TARGET, bundle(&[("lib.typ", b"x")]));
        let (registry, _) = setup(&transport);

        let first = registry.resolve(&example()).await.unwrap();
        let second = registry.resolve(&example()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.calls(TARGET), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_pull() {
        let transport = MockTransport::new().with_delay(Duration::from_millis(20));
        transport.serve(TARGET, bundle(&[("lib.typ", b"x")]));
        let (registry, _) = setup(&transport);

        let spec = example();
        let results = futures::future::join_all((0..8).map(|_| registry.resolve(&spec))).await;

        assert_eq!(transport.total_calls(), 1);
        for result in results {
            assert_eq!(result.unwrap().as_str(), "packages/preview/example-0.1.0/");
        }
    }

    #[tokio::test]
    async fn test_concurrent_failure_is_shared() {
        let transport = MockTransport::new().with_delay(Duration::from_millis(20));
        transport.fail(TARGET, TransportError::Network("reset".into()));
        let (registry, _) = setup(&transport);

        let spec = example();
        let (a, b) = futures::join!(registry.resolve(&spec), registry.resolve(&spec));

        assert_eq!(transport.total_calls(), 1);
        assert!(matches!(a, Err(RegistryError::Unavailable { .. })));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_failure_is_transient() {
        let transport = MockTransport::new();
        transport.fail(TARGET, TransportError::Network("connection reset".into()));
        let (registry, _) = setup(&transport);

        let err = registry.resolve(&example()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable { .. }));
        assert!(!registry.is_resolved(&example()));

        transport.serve(TARGET, bundle(&[("lib.typ", b"x")]));
        registry.resolve(&example()).await.unwrap();
        assert_eq!(transport.calls(TARGET), 2);
    }

    #[tokio::test]
    async fn test_traversal_spec_rejected_without_pull() {
        let transport = MockTransport::new();
        let (registry, mount) = setup(&transport);

        for (namespace, name) in [("preview", ".."), ("..", "x"), ("a/b", "x"), ("preview", "")] {
            let spec = PackageSpec::new(namespace, name, PackageVersion::new(0, 1, 0));
            let err = registry.resolve(&spec).await.unwrap_err();
            assert!(matches!(err, RegistryError::Confinement(_)), "{namespace}/{name}");
        }
        assert_eq!(transport.total_calls(), 0);
        assert!(mount.is_empty());
    }

    #[tokio::test]
    async fn test_bad_archive_commits_nothing() {
        let transport = MockTransport::new();
        transport.serve(TARGET, malicious_bundle());
        let (registry, mount) = setup(&transport);

        let err = registry.resolve(&example()).await.unwrap_err();

        assert!(matches!(err, RegistryError::Malformed { .. }));
        assert!(mount.is_empty());
        assert!(!registry.is_resolved(&example()));
    }

    #[tokio::test]
    async fn test_pull_times_out() {
        let transport = MockTransport::new().with_delay(Duration::from_millis(500));
        transport.serve(TARGET, bundle(&[("lib.typ", b"x")]));
        let builder = ConfigBuilder::new().warm_timeout(Duration::from_millis(10));
        let (registry, mount) = setup_with(builder, &transport);

        let err = registry.resolve(&example()).await.unwrap_err();

        assert_eq!(
            err,
            RegistryError::Timeout {
                spec: example(),
                after: Duration::from_millis(10),
            }
        );
        assert!(mount.is_empty());
    }

    #[tokio::test]
    async fn test_preloaded_package_skips_pull() {
        let transport = MockTransport::new();
        let (registry, mount) = setup(&transport);
        mount.insert_batch(vec![crate::access::FileRecord::new(
            path("packages/preview/example-0.1.0/typst.toml"),
            b"[package]".to_vec(),
            chrono::Utc::now(),
        )]);

        registry.resolve(&example()).await.unwrap();
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_cleared_mount_is_pulled_again() {
        let transport = MockTransport::new();
        transport.serve(TARGET, bundle(&[("lib.typ", b"#let hello = 1")]));
        let (registry, mount) = setup(&transport);
        let lib = path("packages/preview/example-0.1.0/lib.typ");

        registry.resolve(&example()).await.unwrap();
        mount.clear();
        assert!(!registry.is_resolved(&example()));
        assert!(registry.resolved().is_empty());

        registry.resolve(&example()).await.unwrap();
        assert!(mount.file_exists(&lib));
        assert_eq!(transport.calls(TARGET), 2);
    }

    #[tokio::test]
    async fn test_removed_manifest_is_pulled_again() {
        let transport = MockTransport::new();
        transport.serve(
            TARGET,
            bundle(&[("typst.toml", b"[package]"), ("lib.typ", b"x")]),
        );
        let (registry, mount) = setup(&transport);
        let manifest = path("packages/preview/example-0.1.0/typst.toml");

        registry.resolve(&example()).await.unwrap();
        assert!(mount.remove_file(&manifest));

        registry.resolve(&example()).await.unwrap();
        assert!(mount.file_exists(&manifest));
        assert_eq!(transport.calls(TARGET), 2);
    }

    /// Records insertion order and keeps the one-at-a-time batch default.
    struct OrderedMount {
        files: MemoryAccessModel,
        order: parking_lot::Mutex<Vec<VirtualPath>>,
    }

    impl AccessModel for OrderedMount {
        fn file_exists(&self, path: &VirtualPath) -> bool {
            self.files.file_exists(path)
        }

        fn read_file(&self, path: &VirtualPath) -> crate::error::AccessResult<typst::foundations::Bytes> {
            self.files.read_file(path)
        }
    }

    impl WritableAccessModel for OrderedMount {
        fn insert_file(&self, path: VirtualPath, data: typst::foundations::Bytes, mtime: chrono::DateTime<chrono::Utc>) {
            self.order.lock().push(path.clone());
            self.files.insert_file(path, data, mtime);
        }

        fn remove_file(&self, path: &VirtualPath) -> bool {
            self.files.remove_file(path)
        }

        fn clear(&self) {
            self.files.clear();
        }
    }

    #[test]
    fn test_manifest_committed_last() {
        let config = ConfigBuilder::new().build().unwrap();
        let mount = Arc::new(OrderedMount {
            files: MemoryAccessModel::new(),
            order: parking_lot::Mutex::new(Vec::new()),
        });
        let registry = PackageRegistry::new(&config, mount.clone(), Arc::new(MockTransport::new())).unwrap();

        let archive = bundle(&[("typst.toml", b"[package]"), ("lib.typ", b"x"), ("src/a.typ", b"y")]);
        registry.materialize(&example(), &archive).unwrap();

        let order = mount.order.lock();
        assert_eq!(order.len(), 3);
        assert_eq!(order.last(), Some(&path("packages/preview/example-0.1.0/typst.toml")));
    }

    #[tokio::test]
    async fn test_distinct_specs_pull_in_parallel() {
        let transport = MockTransport::new().with_delay(Duration::from_millis(50));
        transport.serve(TARGET, bundle(&[("lib.typ", b"x")]));
        transport.serve(
            "https://pkgs.example/preview/other-1.0.0.tar.gz",
            bundle(&[("lib.typ", b"y")]),
        );
        let (registry, _) = setup(&transport);
        let other = PackageSpec::new("preview", "other", PackageVersion::new(1, 0, 0));

        let first = example();
        let (a, b) = futures::join!(registry.resolve(&first), registry.resolve(&other));

        a.unwrap();
        b.unwrap();
        assert_eq!(transport.total_calls(), 2);
        assert_eq!(transport.peak_concurrency(), 2);
    }

    #[test]
    fn test_resolve_blocking_without_runtime() {
        let transport = MockTransport::new();
        transport.serve(TARGET, bundle(&[("lib.typ", b"x")]));
        let (registry, mount) = setup(&transport);

        let root = registry.resolve_blocking(&example()).unwrap();
        assert!(mount.file_exists(&root.join("lib.typ").unwrap()));
    }
}
