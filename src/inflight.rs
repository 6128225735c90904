//! Deduplication of concurrent asynchronous work by key.
//!
//! The first caller for a key starts the work; everyone who arrives before it
//! finishes awaits the same shared future and observes the same outcome. The
//! entry removes itself when the work completes, so a failure is never
//! remembered beyond the callers that were already waiting.

use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;

type Table<K, T> = Mutex<FxHashMap<K, Shared<BoxFuture<'static, T>>>>;

/// Table of in-flight operations keyed by identity.
pub(crate) struct InFlight<K, T> {
    table: Arc<Table<K, T>>,
}

impl<K, T> InFlight<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    /// Join the operation running for `key`, or start one with `start`.
    ///
    /// `start` is only called when no operation for `key` is in flight.
    pub async fn run<F, Fut>(&self, key: K, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut table = self.table.lock();
            match table.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let shared = settle(Arc::downgrade(&self.table), key.clone(), start())
                        .boxed()
                        .shared();
                    table.insert(key, shared.clone());
                    shared
                }
            }
        };
        shared.await
    }

    /// Number of operations currently in flight.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }
}

/// Drive `work` to completion, then drop its table entry.
async fn settle<K, T>(table: Weak<Table<K, T>>, key: K, work: impl Future<Output = T>) -> T
where
    K: Eq + Hash,
{
    let output = work.await;
    if let Some(table) = table.upgrade() {
        table.lock().remove(&key);
    }
    output
}

/// Await `fut`, giving up after `limit` when a runtime with a timer is
/// available. Without a runtime the future runs unbounded.
pub(crate) async fn bounded<F: Future>(limit: Option<Duration>, fut: F) -> Result<F::Output, Duration> {
    match (limit, Handle::try_current()) {
        (Some(limit), Ok(_)) => tokio::time::timeout(limit, fut).await.map_err(|_| limit),
        _ => Ok(fut.await),
    }
}
