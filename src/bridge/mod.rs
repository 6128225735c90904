//! Bridging a synchronous engine to asynchronous sources.
//!
//! The engine reads files synchronously and must never wait on the network.
//! The bridge fills the caches it reads from ahead of time and re-runs the
//! engine when it still reports misses:
//!
//! ```text
//! discover(main) ──► warm wave ──► warm wave ──► ...      (async)
//!                                      │
//! CompileDriver::run ─► compile ─► Missing(paths) ─► warm ─► compile ─► ...
//!                          │                                      │
//!                          └── Failed(err) ──► BridgeError::Compile
//!                                    retries exhausted ──► MissingResources
//! ```
//!
//! Hosts without an async runtime use [`BlockingAccess`] instead, which
//! warms inside the read itself.

mod blocking;
mod discover;
mod driver;
mod warm;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WarmError;
use crate::path::VirtualPath;

pub use blocking::BlockingAccess;
pub use discover::{Discovered, Discovery, LOADER_FUNCTIONS};
pub use driver::CompileDriver;
pub use warm::MountWarmer;

/// Makes `path` resident in whatever cache serves it.
///
/// Warming a path that has no remote source, or that is already resident,
/// succeeds without doing anything.
#[async_trait]
pub trait Warmer: Send + Sync {
    /// Populate the cache for `path`.
    async fn warm(&self, path: &VirtualPath) -> Result<(), WarmError>;
}

#[async_trait]
impl<T: Warmer + ?Sized> Warmer for Arc<T> {
    async fn warm(&self, path: &VirtualPath) -> Result<(), WarmError> {
        (**self).warm(path).await
    }
}

/// Outcome of one synchronous compile attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T, E> {
    /// The compile finished.
    Done(T),
    /// The compile could not read these paths.
    Missing(Vec<VirtualPath>),
    /// The compile failed for another reason.
    Failed(E),
}

/// A synchronous compile that reports which files it could not read.
pub trait Engine {
    /// The compiled artifact.
    type Output;
    /// Diagnostics for a failed compile.
    type Error;

    /// Run one compile attempt against the current cache contents.
    fn compile(&mut self) -> Attempt<Self::Output, Self::Error>;
}
