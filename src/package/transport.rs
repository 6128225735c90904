//! Injected capabilities for fetching remote bytes.
//!
//! The registry and the network access model never talk to the network
//! themselves. The host selects a [`Transport`] at construction time:
//!
//! - browser and test hosts wrap an async function in [`FnTransport`],
//! - Node and CLI hosts wrap a blocking client in [`BlockingTransport`],
//!   which runs it on the async runtime's blocking pool (or inline when no
//!   runtime is present),
//! - [`BlockingTransport::downloader`] uses the Typst package downloader.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::Handle;

use crate::error::TransportError;

/// Fetches the raw bytes behind a resolved target.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `target`, typically a URL.
    async fn fetch(&self, target: &str) -> Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch(&self, target: &str) -> Result<Vec<u8>, TransportError> {
        (**self).fetch(target).await
    }
}

// =============================================================================
// FnTransport - async closure
// =============================================================================

/// A transport backed by an async function.
///
/// # Example
///
/// ```
/// use typst_access::package::{FnTransport, Transport};
///
/// let transport = FnTransport::new(|target: String| async move {
///     Ok::<_, typst_access::TransportError>(format!("bytes of {target}").into_bytes())
/// });
/// # let _ = transport;
/// ```
pub struct FnTransport<F> {
    fetch: F,
}

impl<F> FnTransport<F> {
    /// Wrap an async function `(target) -> bytes | failure`.
    pub fn new(fetch: F) -> Self {
        Self { fetch }
    }
}

#[async_trait]
impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>, TransportError>> + Send,
{
    async fn fetch(&self, target: &str) -> Result<Vec<u8>, TransportError> {
        (self.fetch)(target.to_string()).await
    }
}

// =============================================================================
// BlockingTransport - blocking client on a dedicated context
// =============================================================================

type BlockingFetch = dyn Fn(&str) -> Result<Vec<u8>, TransportError> + Send + Sync;

/// A transport backed by a blocking function.
///
/// Inside a Tokio runtime the call runs on the blocking thread pool, so it
/// never stalls the async executor. Outside a runtime it runs inline, which
/// is what a blocking host wants when a synchronous read must be satisfied
/// by real I/O.
#[derive(Clone)]
pub struct BlockingTransport {
    fetch: Arc<BlockingFetch>,
}

impl BlockingTransport {
    /// Wrap a blocking function `(target) -> bytes | failure`.
    pub fn new(fetch: impl Fn(&str) -> Result<Vec<u8>, TransportError> + Send + Sync + 'static) -> Self {
        Self {
            fetch: Arc::new(fetch),
        }
    }

    /// HTTP transport through the Typst package downloader.
    #[cfg(feature = "downloader")]
    pub fn downloader(user_agent: impl Into<String>) -> Self {
        let downloader = typst_kit::download::Downloader::new(user_agent.into());
        Self::new(move |target| {
            downloader
                .download_with_progress(target, &mut SilentProgress)
                .map_err(|err| TransportError::Network(err.to_string()))
        })
    }

    /// Run the fetch on the calling thread.
    pub fn fetch_now(&self, target: &str) -> Result<Vec<u8>, TransportError> {
        (self.fetch)(target)
    }
}

#[async_trait]
impl Transport for BlockingTransport {
    async fn fetch(&self, target: &str) -> Result<Vec<u8>, TransportError> {
        let Ok(handle) = Handle::try_current() else {
            return self.fetch_now(target);
        };
        let fetch = Arc::clone(&self.fetch);
        let target = target.to_string();
        handle
            .spawn_blocking(move || fetch(&target))
            .await
            .map_err(|err| TransportError::Network(format!("blocking fetch aborted: {err}")))?
    }
}

/// No-op progress reporter for silent package downloads.
#[cfg(feature = "downloader")]
struct SilentProgress;

#[cfg(feature = "downloader")]
impl typst_kit::download::Progress for SilentProgress {
    fn print_start(&mut self) {}
    fn print_progress(&mut self, _: &typst_kit::download::DownloadState) {}
    fn print_finish(&mut self, _: &typst_kit::download::DownloadState) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fn_transport_passes_target() {
        let transport = FnTransport::new(|target: String| async move {
            Ok::<_, TransportError>(target.into_bytes())
        });
        assert_eq!(transport.fetch("https://x/a").await.unwrap(), b"https://x/a");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_transport_on_runtime() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let transport = BlockingTransport::new(move |target| {
            counter.fetch_add(1, Ordering::SeqCst);
            if target.ends_with("missing") {
                Err(TransportError::NotFound {
                    target: target.to_string(),
                })
            } else {
                Ok(b"ok".to_vec())
            }
        });

        assert_eq!(transport.fetch("https://x/a").await.unwrap(), b"ok");
        assert!(transport.fetch("https://x/missing").await.unwrap_err().is_definitive_absence());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_blocking_transport_without_runtime() {
        let transport = BlockingTransport::new(|_| Ok(vec![1, 2, 3]));
        let data = futures::executor::block_on(transport.fetch("anything")).unwrap();
        assert_eq!(data, vec![1, 2, 3]);
    }
}
