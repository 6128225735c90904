//! Map-based in-memory access model.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use typst::foundations::Bytes;

use super::{AccessModel, FileRecord, WritableAccessModel};
use crate::error::{AccessError, AccessResult};
use crate::path::VirtualPath;

/// An in-memory mount keyed by exact path.
///
/// No normalization happens beyond what [`VirtualPath`] already did, so
/// `a/b.typ` and `a/b.typ/` are different keys.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use typst_access::access::{AccessModel, MemoryAccessModel, WritableAccessModel};
/// use typst_access::typst::foundations::Bytes;
/// use typst_access::VirtualPath;
///
/// let mem = MemoryAccessModel::new();
/// let path = VirtualPath::new("main.typ").unwrap();
/// mem.insert_file(path.clone(), Bytes::new(b"= Hello".to_vec()), Utc::now());
/// assert!(mem.file_exists(&path));
/// ```
#[derive(Debug, Default)]
pub struct MemoryAccessModel {
    files: RwLock<FxHashMap<VirtualPath, FileRecord>>,
}

impl MemoryAccessModel {
    /// Create an empty mount.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the stored record.
    pub fn record(&self, path: &VirtualPath) -> Option<FileRecord> {
        self.files.read().get(path).cloned()
    }

    /// Get the number of stored files.
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<VirtualPath> {
        let mut paths: Vec<_> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl AccessModel for MemoryAccessModel {
    fn file_exists(&self, path: &VirtualPath) -> bool {
        self.files.read().contains_key(path)
    }

    fn read_file(&self, path: &VirtualPath) -> AccessResult<Bytes> {
        self.files
            .read()
            .get(path)
            .map(|record| record.data.clone())
            .ok_or_else(|| AccessError::NotFound(path.clone()))
    }

    fn mtime(&self, path: &VirtualPath) -> Option<DateTime<Utc>> {
        self.files.read().get(path).map(|record| record.mtime)
    }
}

impl WritableAccessModel for MemoryAccessModel {
    fn insert_file(&self, path: VirtualPath, data: Bytes, mtime: DateTime<Utc>) {
        let record = FileRecord {
            path: path.clone(),
            data,
            mtime,
        };
        self.files.write().insert(path, record);
    }

    fn remove_file(&self, path: &VirtualPath) -> bool {
        self.files.write().remove(path).is_some()
    }

    /// Commits the whole batch under one write lock.
    fn insert_batch(&self, records: Vec<FileRecord>) {
        let mut files = self.files.write();
        files.reserve(records.len());
        for record in records {
            files.insert(record.path.clone(), record);
        }
    }

    fn clear(&self) {
        self.files.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> VirtualPath {
        VirtualPath::new(raw).unwrap()
    }

    #[test]
    fn test_write_read_coherence() {
        let mem = MemoryAccessModel::new();
        let cases: [(&str, &[u8]); 3] = [
            ("main.typ", b"= Title"),
            ("img/logo.svg", b"<svg/>"),
            ("empty.txt", b""),
        ];
        for (raw, data) in cases {
            mem.insert_file(path(raw), Bytes::new(data.to_vec()), Utc::now());
        }
        for (raw, data) in cases {
            assert_eq!(&*mem.read_file(&path(raw)).unwrap(), data);
        }
        assert_eq!(mem.len(), 3);
    }

    #[test]
    fn test_insert_overwrites() {
        let mem = MemoryAccessModel::new();
        let p = path("main.typ");
        mem.insert_file(p.clone(), Bytes::new(b"old".to_vec()), Utc::now());
        mem.insert_file(p.clone(), Bytes::new(b"new".to_vec()), Utc::now());
        assert_eq!(&*mem.read_file(&p).unwrap(), b"new");
        assert_eq!(mem.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mem = MemoryAccessModel::new();
        let p = path("main.typ");
        mem.insert_file(p.clone(), Bytes::new(b"x".to_vec()), Utc::now());

        assert!(mem.remove_file(&p));
        assert!(!mem.file_exists(&p));
        assert_eq!(mem.read_file(&p), Err(AccessError::NotFound(p.clone())));
        assert!(!mem.remove_file(&p));
    }

    #[test]
    fn test_exact_key_lookup() {
        let mem = MemoryAccessModel::new();
        mem.insert_file(path("dir/"), Bytes::new(Vec::new()), Utc::now());
        assert!(mem.file_exists(&path("dir/")));
        assert!(!mem.file_exists(&path("dir")));
    }

    #[test]
    fn test_mtime_and_record() {
        let mem = MemoryAccessModel::new();
        let p = path("a.typ");
        let mtime = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        mem.insert_file(p.clone(), Bytes::new(b"a".to_vec()), mtime);
        assert_eq!(mem.mtime(&p), Some(mtime));
        assert_eq!(mem.record(&p).unwrap().path, p);
        assert_eq!(mem.mtime(&path("b.typ")), None);
    }

    #[test]
    fn test_insert_batch_and_clear() {
        let mem = MemoryAccessModel::new();
        let records = vec![
            FileRecord::new(path("p/lib.typ"), b"lib".to_vec(), Utc::now()),
            FileRecord::new(path("p/README.md"), b"readme".to_vec(), Utc::now()),
        ];
        mem.insert_batch(records);
        assert_eq!(mem.paths(), vec![path("p/README.md"), path("p/lib.typ")]);

        mem.clear();
        assert!(mem.is_empty());
    }
}
