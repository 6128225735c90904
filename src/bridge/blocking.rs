//! Warm-on-read adapter for hosts without an async runtime.

use chrono::{DateTime, Utc};
use tracing::warn;
use typst::foundations::Bytes;

use super::Warmer;
use crate::access::AccessModel;
use crate::error::AccessResult;
use crate::path::VirtualPath;

/// An [`AccessModel`] that satisfies misses by blocking on a [`Warmer`].
///
/// A miss on `read_file` drives the warm to completion on the calling
/// thread and reads again. No retry loop is needed around the compile.
///
/// Do not use this from inside an async task: blocking there stalls the
/// executor. Pair it with a
/// [`BlockingTransport`](crate::package::BlockingTransport), which runs the
/// fetch inline when no runtime is present.
#[derive(Debug)]
pub struct BlockingAccess<A, W> {
    access: A,
    warmer: W,
}

impl<A: AccessModel, W: Warmer> BlockingAccess<A, W> {
    /// Read through `access`, warming misses with `warmer`.
    pub fn new(access: A, warmer: W) -> Self {
        Self { access, warmer }
    }

    /// The wrapped model.
    pub fn access(&self) -> &A {
        &self.access
    }

    fn warm_blocking(&self, path: &VirtualPath) {
        if let Err(err) = futures::executor::block_on(self.warmer.warm(path)) {
            warn!(%path, error = %err, "blocking warm failed");
        }
    }
}

impl<A: AccessModel, W: Warmer> AccessModel for BlockingAccess<A, W> {
    fn file_exists(&self, path: &VirtualPath) -> bool {
        if self.access.file_exists(path) {
            return true;
        }
        self.warm_blocking(path);
        self.access.file_exists(path)
    }

    fn read_file(&self, path: &VirtualPath) -> AccessResult<Bytes> {
        match self.access.read_file(path) {
            Err(err) if err.is_not_found() => {
                self.warm_blocking(path);
                self.access.read_file(path)
            }
            result => result,
        }
    }

    fn mtime(&self, path: &VirtualPath) -> Option<DateTime<Utc>> {
        self.access.mtime(path)
    }
}
