//! Import-graph discovery for warm passes.
//!
//! Starting from the main file, each wave warms every pending path
//! concurrently, then scans the files that became readable for further
//! references:
//!
//! - `#import "x.typ"` and `#include "x.typ"` (relative or project-absolute)
//! - `#import "@ns/name:1.0.0"` (the package manifest, then its entrypoint)
//! - static string arguments to file-loading functions such as `image` or
//!   `json`
//!
//! Only literal strings are followed. Paths computed at runtime surface as
//! misses during the compile and are warmed by the retry loop instead.

use futures::future::join_all;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use tracing::{debug, warn};
use typst::syntax::{SyntaxKind, ast};

use super::Warmer;
use crate::access::AccessModel;
use crate::package::{PackageSpec, PathResolver};
use crate::path::VirtualPath;
use crate::world::{decode_utf8, mount_path};

/// Functions whose first positional string argument names a file.
pub const LOADER_FUNCTIONS: &[&str] = &[
    "read",
    "image",
    "json",
    "yaml",
    "toml",
    "csv",
    "xml",
    "cbor",
    "bibliography",
    "plugin",
];

const MANIFEST: &str = "typst.toml";
const DEFAULT_ENTRYPOINT: &str = "lib.typ";

/// Result of a discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    /// Readable files reached from the main file, sorted.
    pub files: Vec<VirtualPath>,
    /// Referenced files that stayed unreadable after warming, sorted.
    pub missing: Vec<VirtualPath>,
    /// Packages imported anywhere in the graph, sorted.
    pub packages: Vec<PackageSpec>,
}

/// Walks the import graph of a Typst project through an access model.
pub struct Discovery<'a> {
    access: &'a dyn AccessModel,
    warmer: &'a dyn Warmer,
    resolver: &'a PathResolver,
    project_root: VirtualPath,
}

enum Reference {
    Path { raw: String },
    Package(PackageSpec),
}

impl<'a> Discovery<'a> {
    /// Discover through `access`, warming with `warmer`. Package paths are
    /// laid out by `resolver`.
    pub fn new(access: &'a dyn AccessModel, warmer: &'a dyn Warmer, resolver: &'a PathResolver) -> Self {
        Self {
            access,
            warmer,
            resolver,
            project_root: VirtualPath::root(),
        }
    }

    /// Resolve project-absolute references (`/x.typ`) below `root`.
    pub fn project_root(mut self, root: VirtualPath) -> Self {
        self.project_root = root.into_dir();
        self
    }

    /// Warm and scan everything reachable from `main`.
    pub async fn run(&self, main: &VirtualPath) -> Discovered {
        let mut seen = FxHashSet::default();
        let mut packages = FxHashSet::default();
        let mut found = Discovered::default();

        seen.insert(main.clone());
        let mut pending = vec![main.clone()];
        while !pending.is_empty() {
            let wave = std::mem::take(&mut pending);
            debug!(size = wave.len(), "warming discovery wave");
            join_all(wave.iter().map(|path| async move {
                if let Err(err) = self.warmer.warm(path).await {
                    warn!(%path, error = %err, "warm failed during discovery");
                }
            }))
            .await;

            for path in wave {
                let Ok(data) = self.access.read_file(&path) else {
                    found.missing.push(path);
                    continue;
                };
                for next in self.follow(&path, &data, &mut packages) {
                    if seen.insert(next.clone()) {
                        pending.push(next);
                    }
                }
                found.files.push(path);
            }
        }

        found.files.sort();
        found.missing.sort();
        found.packages = packages.into_iter().collect();
        found.packages.sort();
        found
    }

    /// Paths referenced by the file at `path`.
    fn follow(&self, path: &VirtualPath, data: &[u8], packages: &mut FxHashSet<PackageSpec>) -> Vec<VirtualPath> {
        if let Some(entry) = self.package_entrypoint(path, data) {
            return vec![entry];
        }
        if path.extension() != Some("typ") {
            return Vec::new();
        }
        let Ok(text) = decode_utf8(data) else {
            return Vec::new();
        };

        let mut next = Vec::new();
        for reference in scan(text) {
            match reference {
                Reference::Package(spec) => {
                    match self.resolver.resolve_path(&spec).and_then(|root| root.join(MANIFEST)) {
                        Ok(manifest) => next.push(manifest),
                        Err(err) => debug!(package = %spec, error = %err, "skipping package import"),
                    }
                    packages.insert(spec);
                }
                Reference::Path { raw } => match self.locate(path, &raw) {
                    Some(target) => next.push(target),
                    None => debug!(%path, reference = raw, "skipping reference outside the mount"),
                },
            }
        }
        next
    }

    /// Resolve `raw` as written in the file at `from`.
    fn locate(&self, from: &VirtualPath, raw: &str) -> Option<VirtualPath> {
        let root = match self.resolver.spec_for(from) {
            Some(spec) => self.resolver.resolve_path(&spec).ok()?,
            None => self.project_root.clone(),
        };
        let within = typst::syntax::VirtualPath::new(from.strip_prefix(&root)?);
        let target = if raw.starts_with('/') {
            typst::syntax::VirtualPath::new(raw)
        } else {
            within.join(raw)
        };
        mount_path(&root, &target).ok()
    }

    /// The entrypoint named by a package manifest, if `path` is one.
    fn package_entrypoint(&self, path: &VirtualPath, data: &[u8]) -> Option<VirtualPath> {
        if path.file_name() != Some(MANIFEST) {
            return None;
        }
        let spec = self.resolver.spec_for(path)?;
        let root = self.resolver.resolve_path(&spec).ok()?;
        if root.join(MANIFEST).ok().as_ref() != Some(path) {
            return None;
        }
        root.join(entrypoint(data)).ok()
    }
}

#[derive(Deserialize)]
struct Manifest {
    package: ManifestPackage,
}

#[derive(Deserialize)]
struct ManifestPackage {
    #[serde(default = "default_entrypoint")]
    entrypoint: String,
}

fn default_entrypoint() -> String {
    DEFAULT_ENTRYPOINT.to_string()
}

fn entrypoint(data: &[u8]) -> String {
    decode_utf8(data)
        .ok()
        .and_then(|text| toml::from_str::<Manifest>(text).ok())
        .map(|manifest| manifest.package.entrypoint)
        .unwrap_or_else(default_entrypoint)
}

/// Collect literal file and package references from Typst markup.
fn scan(text: &str) -> Vec<Reference> {
    let mut references = Vec::new();
    let mut stack = vec![typst::syntax::parse(text)];

    while let Some(node) = stack.pop() {
        match node.kind() {
            SyntaxKind::ModuleImport => {
                if let Some(import) = node.cast::<ast::ModuleImport>() {
                    references.extend(literal(import.source()));
                }
            }
            SyntaxKind::ModuleInclude => {
                if let Some(include) = node.cast::<ast::ModuleInclude>() {
                    references.extend(literal(include.source()));
                }
            }
            SyntaxKind::FuncCall => {
                if let Some(call) = node.cast::<ast::FuncCall>()
                    && let ast::Expr::Ident(ident) = call.callee()
                    && LOADER_FUNCTIONS.contains(&ident.as_str())
                    && let Some(ast::Arg::Pos(arg)) = call.args().items().next()
                {
                    references.extend(literal(arg));
                }
                stack.extend(node.children().cloned());
            }
            _ => stack.extend(node.children().cloned()),
        }
    }

    references
}

fn literal(expr: ast::Expr) -> Option<Reference> {
    let ast::Expr::Str(s) = expr else {
        return None;
    };
    let raw = s.get();
    if raw.starts_with('@') {
        raw.parse().ok().map(Reference::Package)
    } else {
        Some(Reference::Path { raw: raw.to_string() })
    }
}
