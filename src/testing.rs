//! Shared fixtures for unit tests.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::TransportError;
use crate::package::Transport;

const MTIME: u64 = 1_700_000_000;

fn file_header(size: usize) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_mode(0o644);
    header.set_mtime(MTIME);
    header.set_size(size as u64);
    header.set_entry_type(tar::EntryType::Regular);
    header
}

/// Build an uncompressed tar archive from `(path, content)` pairs.
pub(crate) fn bundle(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in files {
        let mut header = file_header(data.len());
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Gzip-compress `data`.
pub(crate) fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A tar archive with one well-formed entry and one `../` entry.
///
/// `tar::Builder::append_data` refuses `..`, so the name is written into
/// the raw header.
pub(crate) fn malicious_bundle() -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    let mut good = file_header(4);
    builder.append_data(&mut good, "lib.typ", &b"good"[..]).unwrap();

    let payload = b"evil";
    let mut evil = file_header(payload.len());
    let name = b"../evil.typ";
    evil.as_old_mut().name[..name.len()].copy_from_slice(name);
    evil.set_cksum();
    builder.append(&evil, &payload[..]).unwrap();

    builder.into_inner().unwrap()
}

/// A transport serving canned responses and counting calls per target.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    responses: Arc<Mutex<FxHashMap<String, Result<Vec<u8>, TransportError>>>>,
    calls: Arc<Mutex<FxHashMap<String, usize>>>,
    total: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    delay: Option<std::time::Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn serve(&self, target: &str, data: Vec<u8>) {
        self.responses.lock().insert(target.to_string(), Ok(data));
    }

    pub fn fail(&self, target: &str, err: TransportError) {
        self.responses.lock().insert(target.to_string(), Err(err));
    }

    pub fn calls(&self, target: &str) -> usize {
        self.calls.lock().get(target).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Most fetches that were running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, target: &str) -> Result<Vec<u8>, TransportError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().entry(target.to_string()).or_default() += 1;
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.responses
            .lock()
            .get(target)
            .cloned()
            .unwrap_or_else(|| {
                Err(TransportError::NotFound {
                    target: target.to_string(),
                })
            })
    }
}
