//! Compile resources shared across worlds: fonts and the standard library.

pub mod font;
pub mod library;

pub use font::{FontOptions, FontSet};
pub use library::{GLOBAL_LIBRARY, create_library_with_inputs};
