//! Typst `World` over an access model.

mod builder;
mod core;

use typst::diag::{FileError, FileResult};

use crate::error::ConfinementError;
use crate::path::VirtualPath;

pub use builder::WorldBuilder;
pub use core::{AccessWorld, Timestamp};

/// Decode bytes as UTF-8, stripping a BOM if present.
pub fn decode_utf8(buf: &[u8]) -> FileResult<&str> {
    let buf = buf.strip_prefix(b"\xef\xbb\xbf").unwrap_or(buf);
    std::str::from_utf8(buf).map_err(|_| FileError::InvalidUtf8)
}

/// Place a Typst path below a mount directory.
///
/// Typst clamps `..` at its own root, so a path that still carries one
/// after normalization escapes `root` and is rejected.
pub fn mount_path(root: &VirtualPath, vpath: &typst::syntax::VirtualPath) -> Result<VirtualPath, ConfinementError> {
    root.join(vpath.as_rootless_path().to_string_lossy())
}
