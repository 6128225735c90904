//! Font sets for Typst worlds.
//!
//! Fonts are expensive to load, so a host builds one [`FontSet`] and shares
//! it between worlds through an `Arc`. Browser-like hosts pass raw font
//! buffers; CLI hosts search the filesystem.

use std::path::{Path, PathBuf};

use typst::foundations::Bytes;
use typst::text::{Font, FontBook};
use typst::utils::LazyHash;
use typst_kit::fonts::{FontSlot, Fonts};

/// Options for a filesystem font search.
///
/// ```ignore
/// let fonts = FontSet::search(
///     &FontOptions::new()
///         .with_system_fonts(false)
///         .add_path("assets/fonts"),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct FontOptions {
    /// Whether to include system fonts.
    pub include_system_fonts: bool,
    /// Extra font directories to search.
    pub custom_paths: Vec<PathBuf>,
}

impl Default for FontOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl FontOptions {
    /// System fonts on, no extra directories.
    pub fn new() -> Self {
        Self {
            include_system_fonts: true,
            custom_paths: Vec::new(),
        }
    }

    /// Set whether to include system fonts.
    pub fn with_system_fonts(mut self, include: bool) -> Self {
        self.include_system_fonts = include;
        self
    }

    /// Add a font directory.
    pub fn add_path(mut self, path: impl AsRef<Path>) -> Self {
        self.custom_paths.push(path.as_ref().to_path_buf());
        self
    }
}

enum Store {
    Loaded(Vec<Font>),
    Searched(Vec<FontSlot>),
}

/// An indexed collection of fonts.
pub struct FontSet {
    book: LazyHash<FontBook>,
    store: Store,
}

impl FontSet {
    /// No fonts at all.
    pub fn empty() -> Self {
        Self::from_fonts(Vec::new())
    }

    /// Parse font files (or collections) from memory. Buffers that are not
    /// fonts are skipped.
    pub fn from_data(buffers: impl IntoIterator<Item = Vec<u8>>) -> Self {
        let fonts = buffers
            .into_iter()
            .flat_map(|data| Font::iter(Bytes::new(data)))
            .collect();
        Self::from_fonts(fonts)
    }

    /// Search the filesystem. Font data loads lazily on first use.
    pub fn search(options: &FontOptions) -> Self {
        let mut searcher = Fonts::searcher();
        searcher.include_system_fonts(options.include_system_fonts);
        let fonts = searcher.search_with(&options.custom_paths);
        tracing::debug!(fonts = fonts.fonts.len(), "font search finished");

        Self {
            book: LazyHash::new(fonts.book),
            store: Store::Searched(fonts.fonts),
        }
    }

    fn from_fonts(fonts: Vec<Font>) -> Self {
        Self {
            book: LazyHash::new(FontBook::from_fonts(&fonts)),
            store: Store::Loaded(fonts),
        }
    }

    /// The font index.
    pub fn book(&self) -> &LazyHash<FontBook> {
        &self.book
    }

    /// The font at `index` in the book.
    pub fn font(&self, index: usize) -> Option<Font> {
        match &self.store {
            Store::Loaded(fonts) => fonts.get(index).cloned(),
            Store::Searched(slots) => slots.get(index)?.get(),
        }
    }

    /// Number of fonts.
    pub fn len(&self) -> usize {
        match &self.store {
            Store::Loaded(fonts) => fonts.len(),
            Store::Searched(slots) => slots.len(),
        }
    }

    /// Whether the set has no fonts.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for FontSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSet").field("fonts", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty() {
        let fonts = FontSet::empty();
        assert!(fonts.is_empty());
        assert_eq!(fonts.book().families().count(), 0);
        assert!(fonts.font(0).is_none());
    }

    #[test]
    fn test_from_data_skips_garbage() {
        let fonts = FontSet::from_data([b"not a font".to_vec(), Vec::new()]);
        assert!(fonts.is_empty());
    }

    #[test]
    fn test_search_empty_dir_without_system_fonts() {
        let dir = TempDir::new().unwrap();
        let fonts = FontSet::search(&FontOptions::new().with_system_fonts(false).add_path(dir.path()));
        assert!((0..fonts.len()).all(|i| fonts.font(i).is_some()));
        assert!(fonts.font(fonts.len()).is_none());
    }
}
