//! Writable in-memory layer over a read-only model.

use chrono::{DateTime, Utc};
use typst::foundations::Bytes;

use super::{AccessModel, FileRecord, MemoryAccessModel, WritableAccessModel};
use crate::error::AccessResult;
use crate::path::VirtualPath;

/// Shadows a lower model with in-memory files.
///
/// Reads check the upper layer first. Writes and removals only touch the
/// upper layer, so removing a shadowing file uncovers the lower one again.
/// Editor hosts use this to compile unsaved buffers over a project on disk.
#[derive(Debug)]
pub struct OverlayAccessModel<L> {
    upper: MemoryAccessModel,
    lower: L,
}

impl<L: AccessModel> OverlayAccessModel<L> {
    /// Layer an empty memory model over `lower`.
    pub fn new(lower: L) -> Self {
        Self {
            upper: MemoryAccessModel::new(),
            lower,
        }
    }

    /// The in-memory layer.
    pub fn upper(&self) -> &MemoryAccessModel {
        &self.upper
    }

    /// The shadowed model.
    pub fn lower(&self) -> &L {
        &self.lower
    }

    /// Whether `path` is shadowed by the upper layer.
    pub fn is_shadowed(&self, path: &VirtualPath) -> bool {
        self.upper.file_exists(path)
    }
}

impl<L: AccessModel> AccessModel for OverlayAccessModel<L> {
    fn file_exists(&self, path: &VirtualPath) -> bool {
        self.upper.file_exists(path) || self.lower.file_exists(path)
    }

    fn read_file(&self, path: &VirtualPath) -> AccessResult<Bytes> {
        match self.upper.read_file(path) {
            Ok(data) => Ok(data),
            Err(err) if err.is_not_found() => self.lower.read_file(path),
            Err(err) => Err(err),
        }
    }

    fn mtime(&self, path: &VirtualPath) -> Option<DateTime<Utc>> {
        self.upper.mtime(path).or_else(|| self.lower.mtime(path))
    }
}

impl<L: AccessModel> WritableAccessModel for OverlayAccessModel<L> {
    fn insert_file(&self, path: VirtualPath, data: Bytes, mtime: DateTime<Utc>) {
        self.upper.insert_file(path, data, mtime);
    }

    fn remove_file(&self, path: &VirtualPath) -> bool {
        self.upper.remove_file(path)
    }

    fn insert_batch(&self, records: Vec<FileRecord>) {
        self.upper.insert_batch(records);
    }

    /// Drops every upper-layer file. The lower model is untouched.
    fn clear(&self) {
        self.upper.clear();
    }
}
