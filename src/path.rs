//! Confined virtual paths.
//!
//! Every path handed to an access model is a [`VirtualPath`]: slash-separated,
//! relative to the mount root, and free of parent-traversal segments. The
//! confinement check runs when the path is constructed, so a value of this
//! type can never name anything outside its mount.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfinementError;

/// A normalized path below a mount root.
///
/// - Backslashes are treated as separators.
/// - Empty and `.` segments are dropped, so `/a//./b` becomes `a/b`.
/// - A trailing slash is kept and marks a directory (e.g. a package root).
/// - The empty path is the mount root itself.
///
/// # Example
///
/// ```
/// use typst_access::VirtualPath;
///
/// let root = VirtualPath::new("packages/preview/example-0.1.0/").unwrap();
/// let lib = root.join("lib.typ").unwrap();
/// assert_eq!(lib.as_str(), "packages/preview/example-0.1.0/lib.typ");
///
/// assert!(VirtualPath::new("../etc/passwd").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualPath(String);

impl VirtualPath {
    /// The mount root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Validate and normalize a raw path.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ConfinementError> {
        normalize(raw.as_ref(), String::new()).map(Self)
    }

    /// Join a relative path onto this one, treating `self` as a directory.
    ///
    /// The joined path is validated again; a `..` segment in `rel` is a
    /// confinement violation even if it would stay below the root.
    pub fn join(&self, rel: impl AsRef<str>) -> Result<Self, ConfinementError> {
        normalize(rel.as_ref(), self.dir_prefix()).map(Self)
    }

    /// The path as a string (no leading slash).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the mount root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this path names a directory (ends with `/`).
    pub fn is_dir(&self) -> bool {
        self.0.ends_with('/')
    }

    /// The same path with a trailing slash.
    pub fn into_dir(self) -> Self {
        Self(self.dir_prefix())
    }

    /// The final segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
    }

    /// The extension of the final segment.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        let (stem, ext) = name.rsplit_once('.')?;
        (!stem.is_empty()).then_some(ext)
    }

    /// The parent directory, with a trailing slash. `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let trimmed = self.0.trim_end_matches('/');
        Some(match trimmed.rfind('/') {
            Some(index) => Self(trimmed[..=index].to_string()),
            None => Self::root(),
        })
    }

    /// The remainder of this path below `prefix`, if `prefix` contains it.
    pub fn strip_prefix(&self, prefix: &VirtualPath) -> Option<&str> {
        if prefix.is_root() {
            return Some(&self.0);
        }
        let dir = prefix.0.trim_end_matches('/');
        let rest = self.0.strip_prefix(dir)?;
        match rest.strip_prefix('/') {
            Some(rest) => Some(rest),
            None if rest.is_empty() => Some(rest),
            None => None,
        }
    }

    /// Whether this path lies at or below `prefix`.
    pub fn starts_with(&self, prefix: &VirtualPath) -> bool {
        self.strip_prefix(prefix).is_some()
    }

    fn dir_prefix(&self) -> String {
        let mut prefix = self.0.clone();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        prefix
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VirtualPath {
    type Err = ConfinementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for VirtualPath {
    type Error = ConfinementError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn normalize(raw: &str, mut out: String) -> Result<String, ConfinementError> {
    if raw.contains('\0') {
        return Err(ConfinementError::new(raw, "contains a NUL byte"));
    }
    let unified = raw.replace('\\', "/");
    if has_drive_prefix(&unified) {
        return Err(ConfinementError::new(raw, "carries a drive prefix"));
    }

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(ConfinementError::new(raw, "escapes the mount root")),
            segment => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(segment);
            }
        }
    }

    if unified.ends_with('/') && !out.is_empty() && !out.ends_with('/') {
        out.push('/');
    }
    Ok(out)
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
