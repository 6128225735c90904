//! `AccessWorld`: a Typst world that reads through an [`AccessModel`].
//!
//! File ids map onto the mount like this:
//!
//! ```text
//! FileId(None,       /chapters/one.typ)  ──►  {project_root}/chapters/one.typ
//! FileId(@ns/n:1.0.0, /src/lib.typ)      ──►  {cache_root}/ns/n-1.0.0/src/lib.typ
//! ```
//!
//! Reads never wait. A file that is not resident is reported to Typst as
//! not found and remembered, so the caller can warm it and compile again.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, Local, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};
use typst::diag::{FileError, FileResult};
use typst::foundations::{Bytes, Datetime};
use typst::syntax::{FileId, Source};
use typst::text::{Font, FontBook};
use typst::utils::LazyHash;
use typst::{Library, World};

use super::builder::WorldBuilder;
use super::{decode_utf8, mount_path};
use crate::access::AccessModel;
use crate::error::AccessError;
use crate::package::{PackageSpec, PathResolver};
use crate::path::VirtualPath;
use crate::resource::font::FontSet;
use crate::resource::library::GLOBAL_LIBRARY;

/// Fixed timestamp for reproducible builds.
///
/// If set, `datetime.today()` returns this fixed time.
/// If not set, `datetime.today()` returns `None`.
pub type Timestamp = DateTime<Utc>;

pub(crate) enum LibrarySource {
    Global,
    Custom(LazyHash<Library>),
}

/// Typst world backed by an access model.
pub struct AccessWorld {
    access: Arc<dyn AccessModel>,
    resolver: PathResolver,
    project_root: VirtualPath,
    main: FileId,
    library: LibrarySource,
    fonts: Arc<FontSet>,
    timestamp: Option<Timestamp>,
    sources: Mutex<FxHashMap<FileId, Source>>,
    files: Mutex<FxHashMap<FileId, Bytes>>,
    misses: Mutex<Vec<VirtualPath>>,
}

impl AccessWorld {
    /// Start configuring a world compiling `main`, a path in the mount.
    pub fn builder(access: Arc<dyn AccessModel>, resolver: PathResolver, main: VirtualPath) -> WorldBuilder {
        WorldBuilder::new(access, resolver, main)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        access: Arc<dyn AccessModel>,
        resolver: PathResolver,
        project_root: VirtualPath,
        main: FileId,
        library: LibrarySource,
        fonts: Arc<FontSet>,
        timestamp: Option<Timestamp>,
    ) -> Self {
        Self {
            access,
            resolver,
            project_root,
            main,
            library,
            fonts,
            timestamp,
            sources: Mutex::new(FxHashMap::default()),
            files: Mutex::new(FxHashMap::default()),
            misses: Mutex::new(Vec::new()),
        }
    }

    /// The mount directory project files live in.
    pub fn project_root(&self) -> &VirtualPath {
        &self.project_root
    }

    /// The path mapping for package files.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Mount path of a Typst file id.
    pub fn locate(&self, id: FileId) -> FileResult<VirtualPath> {
        let root = match id.package() {
            Some(spec) => self
                .resolver
                .resolve_path(&PackageSpec::from(spec))
                .map_err(|_| FileError::AccessDenied)?,
            None => self.project_root.clone(),
        };
        mount_path(&root, id.vpath()).map_err(|err| {
            warn!(error = %err, "file id escapes its root");
            FileError::AccessDenied
        })
    }

    /// Drop per-compile caches and recorded misses.
    pub fn reset(&self) {
        self.sources.lock().clear();
        self.files.lock().clear();
        self.misses.lock().clear();
    }

    /// Paths that could not be read since the last reset, sorted and
    /// deduplicated. Clears the record.
    pub fn take_misses(&self) -> Vec<VirtualPath> {
        let mut misses = std::mem::take(&mut *self.misses.lock());
        misses.sort();
        misses.dedup();
        misses
    }

    fn read(&self, id: FileId) -> FileResult<Bytes> {
        let path = self.locate(id)?;
        match self.access.read_file(&path) {
            Ok(data) => Ok(data),
            Err(AccessError::NotFound(_)) => {
                debug!(%path, "read miss");
                let missing = PathBuf::from(path.as_str());
                self.misses.lock().push(path);
                Err(FileError::NotFound(missing))
            }
            Err(AccessError::Confinement(err)) => {
                warn!(error = %err, "rejected read outside the mount");
                Err(FileError::AccessDenied)
            }
        }
    }
}

impl World for AccessWorld {
    fn library(&self) -> &LazyHash<Library> {
        match &self.library {
            LibrarySource::Global => &GLOBAL_LIBRARY,
            LibrarySource::Custom(lib) => lib,
        }
    }

    fn book(&self) -> &LazyHash<FontBook> {
        self.fonts.book()
    }

    fn main(&self) -> FileId {
        self.main
    }

    fn source(&self, id: FileId) -> FileResult<Source> {
        if let Some(source) = self.sources.lock().get(&id) {
            return Ok(source.clone());
        }
        let bytes = self.read(id)?;
        let source = Source::new(id, decode_utf8(&bytes)?.into());
        self.sources.lock().insert(id, source.clone());
        Ok(source)
    }

    fn file(&self, id: FileId) -> FileResult<Bytes> {
        if let Some(bytes) = self.files.lock().get(&id) {
            return Ok(bytes.clone());
        }
        let bytes = self.read(id)?;
        self.files.lock().insert(id, bytes.clone());
        Ok(bytes)
    }

    fn font(&self, index: usize) -> Option<Font> {
        self.fonts.font(index)
    }

    fn today(&self, offset: Option<i64>) -> Option<Datetime> {
        let now = self.timestamp.as_ref()?;

        let with_offset = match offset {
            None => now.with_timezone(&Local).fixed_offset(),
            Some(hours) => {
                let seconds = i32::try_from(hours).ok()?.checked_mul(3600)?;
                now.with_timezone(&FixedOffset::east_opt(seconds)?)
            }
        };

        Datetime::from_ymd(
            with_offset.year(),
            with_offset.month().try_into().ok()?,
            with_offset.day().try_into().ok()?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::access::{MemoryAccessModel, WritableAccessModel};
    use crate::config::AccessConfig;

    fn path(raw: &str) -> VirtualPath {
        VirtualPath::new(raw).unwrap()
    }

    fn world(mem: Arc<MemoryAccessModel>) -> AccessWorld {
        let resolver = PathResolver::new(&AccessConfig::default()).unwrap();
        AccessWorld::builder(mem, resolver, path("site/main.typ"))
            .project_root(path("site/"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_locate_project_and_package_files() {
        let world = world(Arc::new(MemoryAccessModel::new()));

        let project = FileId::new(None, typst::syntax::VirtualPath::new("/img/a.png"));
        assert_eq!(world.locate(project).unwrap().as_str(), "site/img/a.png");

        let spec: typst::syntax::package::PackageSpec = "@preview/example:0.1.0".parse().unwrap();
        let package = FileId::new(Some(spec), typst::syntax::VirtualPath::new("/lib.typ"));
        assert_eq!(
            world.locate(package).unwrap().as_str(),
            "packages/preview/example-0.1.0/lib.typ"
        );
    }

    #[test]
    fn test_main_source_is_read_through_access() {
        let mem = Arc::new(MemoryAccessModel::new());
        mem.insert_file(path("site/main.typ"), Bytes::new(b"= Hi".to_vec()), Utc::now());
        let world = world(mem);

        assert_eq!(world.source(world.main()).unwrap().text(), "= Hi");
        assert!(world.take_misses().is_empty());
    }

    #[test]
    fn test_misses_are_recorded_until_taken() {
        let world = world(Arc::new(MemoryAccessModel::new()));
        let id = FileId::new(None, typst::syntax::VirtualPath::new("/data.json"));

        assert!(matches!(world.file(id), Err(FileError::NotFound(_))));
        assert!(world.file(id).is_err());
        assert_eq!(world.take_misses(), vec![path("site/data.json")]);
        assert!(world.take_misses().is_empty());
    }

    #[test]
    fn test_reset_drops_cached_content() {
        let mem = Arc::new(MemoryAccessModel::new());
        mem.insert_file(path("site/a.txt"), Bytes::new(b"old".to_vec()), Utc::now());
        let world = world(mem.clone());
        let id = FileId::new(None, typst::syntax::VirtualPath::new("/a.txt"));

        assert_eq!(&*world.file(id).unwrap(), b"old");
        mem.insert_file(path("site/a.txt"), Bytes::new(b"new".to_vec()), Utc::now());
        assert_eq!(&*world.file(id).unwrap(), b"old");

        world.reset();
        assert_eq!(&*world.file(id).unwrap(), b"new");
    }

    #[test]
    fn test_today_uses_fixed_timestamp() {
        let resolver = PathResolver::new(&AccessConfig::default()).unwrap();
        let stamp = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let world = AccessWorld::builder(Arc::new(MemoryAccessModel::new()), resolver, path("main.typ"))
            .with_timestamp(stamp)
            .build()
            .unwrap();

        assert_eq!(world.today(Some(0)), Datetime::from_ymd(2024, 3, 15));
    }
}
