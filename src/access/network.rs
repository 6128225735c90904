//! Memoized access to files behind a remote base location.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tracing::{debug, warn};
use typst::foundations::Bytes;

use super::{AccessModel, FileRecord};
use crate::error::{AccessError, AccessResult, TransportError, WarmError};
use crate::inflight::{InFlight, bounded};
use crate::package::Transport;
use crate::path::VirtualPath;

/// What is known about one remote path.
#[derive(Debug, Clone)]
enum Memo {
    Resident(FileRecord),
    /// The remote answered with a definitive "does not exist".
    Absent,
}

/// A read-only mount whose files live at `{base}{path}`.
///
/// Reads only consult the memo. A read of an unknown path schedules a
/// background [`warm`](Self::warm) when called inside a Tokio runtime and
/// reports [`AccessError::NotFound`] right away; the caller retries after
/// warming.
///
/// Transient failures leave no trace, so the next warm asks again. A
/// confirmed absence is remembered until [`forget`](Self::forget).
#[derive(Clone)]
pub struct NetworkAccessModel {
    inner: Arc<NetworkInner>,
}

struct NetworkInner {
    base: String,
    transport: Arc<dyn Transport>,
    timeout: Option<Duration>,
    memo: RwLock<FxHashMap<VirtualPath, Memo>>,
    in_flight: InFlight<VirtualPath, Result<(), WarmError>>,
}

impl NetworkAccessModel {
    /// Create a model fetching below `base` through `transport`.
    ///
    /// A trailing slash is added to `base` if missing.
    pub fn new(base: impl Into<String>, transport: Arc<dyn Transport>, timeout: Option<Duration>) -> Self {
        let mut base = base.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self {
            inner: Arc::new(NetworkInner {
                base,
                transport,
                timeout,
                memo: RwLock::new(FxHashMap::default()),
                in_flight: InFlight::new(),
            }),
        }
    }

    /// The remote base location.
    pub fn base(&self) -> &str {
        &self.inner.base
    }

    /// Remote location of `path`.
    pub fn target(&self, path: &VirtualPath) -> String {
        format!("{}{}", self.inner.base, path)
    }

    /// Fetch `path` into the memo unless it is already known.
    ///
    /// A definitive 404 is recorded as absent and is not an error.
    pub async fn warm(&self, path: &VirtualPath) -> Result<(), WarmError> {
        if self.inner.memo.read().contains_key(path) {
            return Ok(());
        }
        let model = self.clone();
        let key = path.clone();
        self.inner
            .in_flight
            .run(path.clone(), move || async move { model.fetch_into_memo(key).await })
            .await
    }

    /// Drop what is known about `path`. Returns whether anything was known.
    pub fn forget(&self, path: &VirtualPath) -> bool {
        self.inner.memo.write().remove(path).is_some()
    }

    /// Whether the remote confirmed that `path` does not exist.
    pub fn is_confirmed_absent(&self, path: &VirtualPath) -> bool {
        matches!(self.inner.memo.read().get(path), Some(Memo::Absent))
    }

    async fn fetch_into_memo(&self, path: VirtualPath) -> Result<(), WarmError> {
        let target = self.target(&path);
        debug!(%path, %target, "warming remote file");

        let fetched = match bounded(self.inner.timeout, self.inner.transport.fetch(&target)).await {
            Ok(result) => result,
            Err(after) => Err(TransportError::Timeout(after)),
        };

        let memo = match fetched {
            Ok(data) => Memo::Resident(FileRecord::new(path.clone(), data, Utc::now())),
            Err(err) if err.is_definitive_absence() => {
                debug!(%path, "remote file does not exist");
                Memo::Absent
            }
            Err(err) => {
                warn!(%path, error = %err, "remote fetch failed");
                return Err(err.into());
            }
        };
        self.inner.memo.write().insert(path, memo);
        Ok(())
    }

    fn lookup(&self, path: &VirtualPath) -> Option<Memo> {
        let memo = self.inner.memo.read().get(path).cloned();
        if memo.is_none() {
            self.schedule_warm(path);
        }
        memo
    }

    fn schedule_warm(&self, path: &VirtualPath) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let model = self.clone();
        let path = path.clone();
        handle.spawn(async move {
            // Failures are logged by the fetch and retried on the next miss.
            let _ = model.warm(&path).await;
        });
    }
}

impl AccessModel for NetworkAccessModel {
    fn file_exists(&self, path: &VirtualPath) -> bool {
        matches!(self.lookup(path), Some(Memo::Resident(_)))
    }

    fn read_file(&self, path: &VirtualPath) -> AccessResult<Bytes> {
        match self.lookup(path) {
            Some(Memo::Resident(record)) => Ok(record.data),
            _ => Err(AccessError::NotFound(path.clone())),
        }
    }

    fn mtime(&self, path: &VirtualPath) -> Option<DateTime<Utc>> {
        match self.inner.memo.read().get(path) {
            Some(Memo::Resident(record)) => Some(record.mtime),
            _ => None,
        }
    }
}

impl std::fmt::Debug for NetworkAccessModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkAccessModel")
            .field("base", &self.inner.base)
            .field("timeout", &self.inner.timeout)
            .field("known", &self.inner.memo.read().len())
            .field("in_flight", &self.inner.in_flight.len())
            .finish_non_exhaustive()
    }
}
