//! Read-only mount of a local directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;
use typst::foundations::Bytes;

use super::AccessModel;
use crate::error::{AccessError, AccessResult};
use crate::path::VirtualPath;

/// Serves files below a directory on disk.
///
/// Meant for CLI hosts where the project already lives on a local
/// filesystem. Directories, unreadable entries, and missing files all read
/// as [`AccessError::NotFound`].
#[derive(Debug, Clone)]
pub struct DirAccessModel {
    root: PathBuf,
}

impl DirAccessModel {
    /// Mount `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The mounted directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of `path` on disk.
    pub fn disk_path(&self, path: &VirtualPath) -> PathBuf {
        // `VirtualPath` has no `..` or drive prefix, so pushing its segments
        // stays below `root`.
        path.as_str()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |mut disk, segment| {
                disk.push(segment);
                disk
            })
    }

    fn metadata(&self, path: &VirtualPath) -> Option<fs::Metadata> {
        fs::metadata(self.disk_path(path)).ok().filter(fs::Metadata::is_file)
    }
}

impl AccessModel for DirAccessModel {
    fn file_exists(&self, path: &VirtualPath) -> bool {
        self.metadata(path).is_some()
    }

    fn read_file(&self, path: &VirtualPath) -> AccessResult<Bytes> {
        let disk = self.disk_path(path);
        if self.metadata(path).is_none() {
            return Err(AccessError::NotFound(path.clone()));
        }
        fs::read(&disk).map(Bytes::new).map_err(|err| {
            debug!(path = %disk.display(), error = %err, "failed to read mounted file");
            AccessError::NotFound(path.clone())
        })
    }

    fn mtime(&self, path: &VirtualPath) -> Option<DateTime<Utc>> {
        self.metadata(path)?.modified().ok().map(DateTime::<Utc>::from)
    }
}
