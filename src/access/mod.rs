//! Synchronous file access against virtual mounts.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Access Model Layers                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  engine ──► AccessModel::read_file(path)                     │
//! │                 │                                            │
//! │                 ├─► MemoryAccessModel   (exact-key map)      │
//! │                 ├─► OverlayAccessModel  (memory over lower)  │
//! │                 ├─► DirAccessModel      (local directory)    │
//! │                 └─► NetworkAccessModel  (memoized fetches)   │
//! │                                                              │
//! │  host ──► Mount::insert_file("a/b.typ", ...)                 │
//! │                 └─► confinement check ─► WritableAccessModel │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads never block on I/O that may be slow: content that is not resident
//! comes back as [`AccessError::NotFound`], and the bridge warms it before
//! the next attempt.

mod dir;
mod memory;
mod mount;
mod network;
mod overlay;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use typst::foundations::Bytes;

use crate::error::AccessResult;
use crate::path::VirtualPath;

pub use dir::DirAccessModel;
pub use memory::MemoryAccessModel;
pub use mount::Mount;
pub use network::NetworkAccessModel;
pub use overlay::OverlayAccessModel;

/// A file stored by in-memory and writable backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Where the file lives in the mount.
    pub path: VirtualPath,
    /// File content.
    pub data: Bytes,
    /// Last modification time.
    pub mtime: DateTime<Utc>,
}

impl FileRecord {
    /// Create a record from owned bytes.
    pub fn new(path: VirtualPath, data: Vec<u8>, mtime: DateTime<Utc>) -> Self {
        Self {
            path,
            data: Bytes::new(data),
            mtime,
        }
    }
}

/// Synchronous presence and content queries against a virtual mount.
///
/// Implementations must answer immediately. Content that is not resident is
/// reported as [`AccessError::NotFound`](crate::AccessError::NotFound), never
/// waited for.
pub trait AccessModel: Send + Sync {
    /// Whether `path` is resident.
    fn file_exists(&self, path: &VirtualPath) -> bool;

    /// Read the content of `path`.
    fn read_file(&self, path: &VirtualPath) -> AccessResult<Bytes>;

    /// Last modification time of `path`, if known.
    fn mtime(&self, _path: &VirtualPath) -> Option<DateTime<Utc>> {
        None
    }
}

/// An [`AccessModel`] that the host or the registry can write to.
pub trait WritableAccessModel: AccessModel {
    /// Insert or overwrite a file.
    fn insert_file(&self, path: VirtualPath, data: Bytes, mtime: DateTime<Utc>);

    /// Remove a file. Returns whether it existed.
    fn remove_file(&self, path: &VirtualPath) -> bool;

    /// Insert many files at once.
    ///
    /// Backends that can make the batch visible atomically should override
    /// this. The default inserts one file at a time, in order, so readers
    /// may observe a prefix of the batch.
    fn insert_batch(&self, records: Vec<FileRecord>) {
        for record in records {
            self.insert_file(record.path, record.data, record.mtime);
        }
    }

    /// Remove every file.
    fn clear(&self);
}

impl<T: AccessModel + ?Sized> AccessModel for Arc<T> {
    fn file_exists(&self, path: &VirtualPath) -> bool {
        (**self).file_exists(path)
    }

    fn read_file(&self, path: &VirtualPath) -> AccessResult<Bytes> {
        (**self).read_file(path)
    }

    fn mtime(&self, path: &VirtualPath) -> Option<DateTime<Utc>> {
        (**self).mtime(path)
    }
}

impl<T: WritableAccessModel + ?Sized> WritableAccessModel for Arc<T> {
    fn insert_file(&self, path: VirtualPath, data: Bytes, mtime: DateTime<Utc>) {
        (**self).insert_file(path, data, mtime)
    }

    fn remove_file(&self, path: &VirtualPath) -> bool {
        (**self).remove_file(path)
    }

    fn insert_batch(&self, records: Vec<FileRecord>) {
        (**self).insert_batch(records)
    }

    fn clear(&self) {
        (**self).clear()
    }
}
