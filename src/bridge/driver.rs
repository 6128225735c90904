//! Bounded warm-and-retry loop around a synchronous engine.

use futures::future::join_all;
use tracing::{debug, warn};

use super::{Attempt, Engine, Warmer};
use crate::config::{AccessConfig, DEFAULT_MAX_RETRIES};
use crate::error::BridgeError;
use crate::path::VirtualPath;

/// Runs an [`Engine`] until it succeeds, fails, or runs out of retries.
///
/// Each retry warms the paths the previous attempt missed, so a compile
/// that needs `n` rounds of discovery takes at most `max_retries + 1`
/// attempts. Dropping the future returned by [`run`](Self::run) abandons
/// the pass; anything already committed to a cache stays valid.
#[derive(Debug, Clone)]
pub struct CompileDriver<W> {
    warmer: W,
    max_retries: usize,
}

impl<W: Warmer> CompileDriver<W> {
    /// Create a driver using the configured retry bound.
    pub fn new(warmer: W, config: &AccessConfig) -> Self {
        Self {
            warmer,
            max_retries: config.max_retries,
        }
    }

    /// Create a driver with the default retry bound.
    pub fn with_warmer(warmer: W) -> Self {
        Self {
            warmer,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Override the retry bound.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    /// The warmer used between attempts.
    pub fn warmer(&self) -> &W {
        &self.warmer
    }

    /// Warm `expected`, then compile until done.
    pub async fn run<E: Engine>(
        &self,
        engine: &mut E,
        expected: &[VirtualPath],
    ) -> Result<E::Output, BridgeError<E::Error>> {
        self.warm_all(expected).await;

        let mut retries = 0;
        loop {
            match engine.compile() {
                Attempt::Done(output) => return Ok(output),
                Attempt::Failed(err) => return Err(BridgeError::Compile(err)),
                Attempt::Missing(paths) if retries == self.max_retries => {
                    warn!(attempts = retries + 1, missing = paths.len(), "giving up on missing resources");
                    return Err(BridgeError::MissingResources {
                        paths,
                        attempts: retries + 1,
                    });
                }
                Attempt::Missing(paths) => {
                    retries += 1;
                    debug!(retry = retries, missing = paths.len(), "compile missed resources");
                    self.warm_all(&paths).await;
                }
            }
        }
    }

    /// Warm every path concurrently. Failures are logged, not returned:
    /// the next attempt reports whatever is still missing.
    pub async fn warm_all(&self, paths: &[VirtualPath]) {
        let mut unique = paths.to_vec();
        unique.sort();
        unique.dedup();

        join_all(unique.iter().map(|path| async move {
            if let Err(err) = self.warmer.warm(path).await {
                warn!(%path, error = %err, "warm failed");
            }
        }))
        .await;
    }
}
