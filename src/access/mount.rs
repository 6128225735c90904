//! Host-facing string API over a writable model.

use chrono::{DateTime, Utc};
use tracing::warn;
use typst::foundations::Bytes;

use super::WritableAccessModel;
use crate::error::{AccessResult, ConfinementError};
use crate::path::VirtualPath;

/// Validates host-supplied path strings before they reach a backend.
///
/// Every method parses its input into a [`VirtualPath`] first. A path that
/// would escape the mount root is rejected with a [`ConfinementError`] and
/// the backend is never called.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use typst_access::access::{MemoryAccessModel, Mount};
///
/// let mount = Mount::new(MemoryAccessModel::new());
/// mount.insert_file("chapters/one.typ", b"= One".to_vec(), Utc::now()).unwrap();
/// assert!(mount.file_exists("chapters/one.typ"));
/// assert!(mount.insert_file("../escape.typ", Vec::new(), Utc::now()).is_err());
/// ```
#[derive(Debug, Default)]
pub struct Mount<M> {
    backend: M,
}

impl<M: WritableAccessModel> Mount<M> {
    /// Wrap `backend`.
    pub fn new(backend: M) -> Self {
        Self { backend }
    }

    /// The wrapped model.
    pub fn backend(&self) -> &M {
        &self.backend
    }

    /// Unwrap the model.
    pub fn into_inner(self) -> M {
        self.backend
    }

    /// Insert or overwrite a file.
    pub fn insert_file(&self, path: &str, data: Vec<u8>, mtime: DateTime<Utc>) -> Result<(), ConfinementError> {
        let path = confine(path)?;
        self.backend.insert_file(path, Bytes::new(data), mtime);
        Ok(())
    }

    /// Remove a file. Returns whether it existed.
    pub fn remove_file(&self, path: &str) -> Result<bool, ConfinementError> {
        let path = confine(path)?;
        Ok(self.backend.remove_file(&path))
    }

    /// Whether `path` is resident. Paths outside the mount never are.
    pub fn file_exists(&self, path: &str) -> bool {
        confine(path).is_ok_and(|path| self.backend.file_exists(&path))
    }

    /// Read a file.
    pub fn read_file(&self, path: &str) -> AccessResult<Bytes> {
        let path = confine(path)?;
        self.backend.read_file(&path)
    }

    /// Remove every file.
    pub fn clear(&self) {
        self.backend.clear();
    }
}

fn confine(raw: &str) -> Result<VirtualPath, ConfinementError> {
    VirtualPath::new(raw).inspect_err(|err| {
        warn!(path = raw, reason = err.reason, "rejected path outside the mount");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessModel, MemoryAccessModel};
    use crate::error::AccessError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts every call that reaches the backend.
    #[derive(Default)]
    struct Counting {
        inner: MemoryAccessModel,
        calls: AtomicUsize,
    }

    impl Counting {
        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl AccessModel for Counting {
        fn file_exists(&self, path: &VirtualPath) -> bool {
            self.hit();
            self.inner.file_exists(path)
        }

        fn read_file(&self, path: &VirtualPath) -> AccessResult<Bytes> {
            self.hit();
            self.inner.read_file(path)
        }
    }

    impl WritableAccessModel for Counting {
        fn insert_file(&self, path: VirtualPath, data: Bytes, mtime: DateTime<Utc>) {
            self.hit();
            self.inner.insert_file(path, data, mtime);
        }

        fn remove_file(&self, path: &VirtualPath) -> bool {
            self.hit();
            self.inner.remove_file(path)
        }

        fn clear(&self) {
            self.hit();
            self.inner.clear();
        }
    }

    #[test]
    fn test_traversal_never_reaches_backend() {
        let mount = Mount::new(Counting::default());
        for raw in ["../a.typ", "a/../../b.typ", "..\\win.typ", "a\0b"] {
            assert!(mount.insert_file(raw, b"x".to_vec(), Utc::now()).is_err(), "{raw:?}");
            assert!(mount.remove_file(raw).is_err());
            assert!(!mount.file_exists(raw));
            assert!(matches!(mount.read_file(raw), Err(AccessError::Confinement(_))));
        }
        assert_eq!(mount.backend().calls.load(Ordering::SeqCst), 0);
        assert!(mount.backend().inner.is_empty());
    }

    #[test]
    fn test_valid_paths_are_normalized() {
        let mount = Mount::new(MemoryAccessModel::new());
        mount.insert_file("/assets//./logo.svg", b"<svg/>".to_vec(), Utc::now()).unwrap();

        assert!(mount.file_exists("assets/logo.svg"));
        assert_eq!(&*mount.read_file("assets/logo.svg").unwrap(), b"<svg/>");
        assert_eq!(mount.remove_file("assets/logo.svg"), Ok(true));
        assert!(mount.read_file("assets/logo.svg").unwrap_err().is_not_found());
    }
}
