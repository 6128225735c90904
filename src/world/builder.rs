//! Builder pattern for `AccessWorld`.

use std::sync::Arc;

use typst::foundations::Dict;
use typst::syntax::FileId;

use super::core::{AccessWorld, LibrarySource, Timestamp};
use crate::access::AccessModel;
use crate::error::ConfinementError;
use crate::package::PathResolver;
use crate::path::VirtualPath;
use crate::resource::font::FontSet;
use crate::resource::library::create_library_with_inputs;

/// Builder for configuring [`AccessWorld`].
///
/// Use [`AccessWorld::builder`] to create a builder.
///
/// ```ignore
/// let world = AccessWorld::builder(access, resolver, VirtualPath::new("site/index.typ")?)
///     .project_root(VirtualPath::new("site/")?)
///     .with_fonts(fonts)
///     .with_inputs([("lang", "en")])
///     .build()?;
/// ```
pub struct WorldBuilder {
    access: Arc<dyn AccessModel>,
    resolver: PathResolver,
    main: VirtualPath,
    project_root: VirtualPath,
    library: LibrarySource,
    fonts: Option<Arc<FontSet>>,
    timestamp: Option<Timestamp>,
}

impl WorldBuilder {
    pub(crate) fn new(access: Arc<dyn AccessModel>, resolver: PathResolver, main: VirtualPath) -> Self {
        Self {
            access,
            resolver,
            main,
            project_root: VirtualPath::root(),
            library: LibrarySource::Global,
            fonts: None,
            timestamp: None,
        }
    }

    /// Mount directory that project-absolute paths (`/x.typ`) resolve in.
    ///
    /// Defaults to the mount root.
    pub fn project_root(mut self, root: VirtualPath) -> Self {
        self.project_root = root.into_dir();
        self
    }

    /// Use a shared font set. Without one the world has no fonts, which is
    /// enough for HTML output of text-only documents.
    pub fn with_fonts(mut self, fonts: Arc<FontSet>) -> Self {
        self.fonts = Some(fonts);
        self
    }

    /// Configure `sys.inputs` for the compilation.
    pub fn with_inputs<I, K, V>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<typst::foundations::Str>,
        V: typst::foundations::IntoValue,
    {
        let dict: Dict = inputs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into_value()))
            .collect();
        self.library = LibrarySource::Custom(create_library_with_inputs(dict));
        self
    }

    /// Fix the date `datetime.today()` reports.
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Build the world.
    ///
    /// Fails if the main file does not lie below the project root.
    pub fn build(self) -> Result<AccessWorld, ConfinementError> {
        let within = self
            .main
            .strip_prefix(&self.project_root)
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| ConfinementError::new(self.main.as_str(), "is outside the project root"))?;
        let main = FileId::new(None, typst::syntax::VirtualPath::new(within));
        let fonts = self.fonts.unwrap_or_else(|| Arc::new(FontSet::empty()));

        Ok(AccessWorld::new(
            self.access,
            self.resolver,
            self.project_root,
            main,
            self.library,
            fonts,
            self.timestamp,
        ))
    }
}
