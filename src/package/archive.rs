//! Package bundle decoding.
//!
//! A bundle is a tar archive of the package's directory tree, optionally
//! gzip-compressed (detected by magic bytes). Decoding only stages records;
//! nothing touches a mount until every entry has been read and validated.

use std::io::Read;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use tar::Archive;

use crate::access::FileRecord;
use crate::path::VirtualPath;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decode `bundle` into records rooted at `root`.
///
/// Directory and metadata entries are skipped. Any entry whose path would
/// leave `root` fails the whole bundle.
pub(crate) fn unpack(root: &VirtualPath, bundle: &[u8]) -> Result<Vec<FileRecord>, String> {
    let reader: Box<dyn Read + '_> = if bundle.starts_with(&GZIP_MAGIC) {
        Box::new(GzDecoder::new(bundle))
    } else {
        Box::new(bundle)
    };

    let mut archive = Archive::new(reader);
    let mut staged = Vec::new();
    for entry in archive.entries().map_err(|err| err.to_string())? {
        let mut entry = entry.map_err(|err| err.to_string())?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .map_err(|err| err.to_string())?
            .to_string_lossy()
            .into_owned();
        let path = root.join(&rel).map_err(|err| format!("entry {err}"))?;
        let mtime = entry
            .header()
            .mtime()
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(i64::try_from(secs).ok()?, 0))
            .unwrap_or_default();

        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry
            .read_to_end(&mut data)
            .map_err(|err| format!("reading `{rel}`: {err}"))?;
        staged.push(FileRecord::new(path, data, mtime));
    }

    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bundle, gzip, malicious_bundle};

    fn root() -> VirtualPath {
        VirtualPath::new("packages/preview/example-0.1.0/").unwrap()
    }

    #[test]
    fn test_unpack_plain_tar() {
        let data = bundle(&[("lib.typ", b"#let x = 1"), ("src/util.typ", b"util")]);
        let records = unpack(&root(), &data).unwrap();

        let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "packages/preview/example-0.1.0/lib.typ",
                "packages/preview/example-0.1.0/src/util.typ"
            ]
        );
        assert_eq!(&*records[0].data, b"#let x = 1");
        assert_eq!(records[0].mtime.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_unpack_gzip() {
        let data = gzip(&bundle(&[("typst.toml", b"[package]")]));
        let records = unpack(&root(), &data).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(&*records[0].data, b"[package]");
    }

    #[test]
    fn test_rejects_traversal_entry() {
        let data = malicious_bundle();
        let err = unpack(&root(), &data).unwrap_err();
        assert!(err.contains("escapes the mount root"), "{err}");
    }

    #[test]
    fn test_rejects_corrupt_gzip() {
        assert!(unpack(&root(), &[0x1f, 0x8b, 0x00, 0x01, 0x02, 0x03]).is_err());
    }
}
