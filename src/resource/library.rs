//! Shared Typst standard library with the HTML feature enabled.
//!
//! Every [`AccessWorld`](crate::world::AccessWorld) without `sys.inputs`
//! uses [`GLOBAL_LIBRARY`], so comemo can reuse work across compiles.

use std::sync::LazyLock;

use typst::foundations::Dict;
use typst::utils::LazyHash;
use typst::{Feature, Features, Library, LibraryExt};

/// Standard library with `Feature::Html`, built on first access.
pub static GLOBAL_LIBRARY: LazyLock<LazyHash<Library>> = LazyLock::new(|| {
    LazyHash::new(
        Library::builder()
            .with_features(Features::from_iter([Feature::Html]))
            .build(),
    )
});

/// Build a library whose `sys.inputs` is `inputs`.
///
/// ```typst
/// #let lang = sys.inputs.at("lang", default: "en")
/// ```
pub fn create_library_with_inputs(inputs: Dict) -> LazyHash<Library> {
    LazyHash::new(
        Library::builder()
            .with_inputs(inputs)
            .with_features(Features::from_iter([Feature::Html]))
            .build(),
    )
}
