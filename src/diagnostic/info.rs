//! Structured diagnostic information for custom rendering.

use std::fmt;

use typst::World;
use typst::diag::{Severity, SourceDiagnostic, Tracepoint};
use typst::syntax::Span;

use super::format::{DiagnosticOptions, format_info};

/// Summary of diagnostic counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticSummary {
    /// Number of errors.
    pub errors: usize,
    /// Number of warnings.
    pub warnings: usize,
}

impl DiagnosticSummary {
    /// Whether there are any errors.
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

impl fmt::Display for DiagnosticSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        match (self.errors, self.warnings) {
            (0, 0) => write!(f, "no diagnostics"),
            (e, 0) => write!(f, "{e} error{}", plural(e)),
            (0, w) => write!(f, "{w} warning{}", plural(w)),
            (e, w) => write!(f, "{e} error{}, {w} warning{}", plural(e), plural(w)),
        }
    }
}

/// Resolved diagnostics.
///
/// Source locations are looked up while the world is still around, so the
/// collection can be formatted after the world is gone.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<DiagnosticInfo>,
}

impl Diagnostics {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve raw diagnostics against `world`.
    pub fn resolve<W: World>(world: &W, diagnostics: &[SourceDiagnostic]) -> Self {
        Self {
            items: diagnostics.iter().map(|d| DiagnosticInfo::resolve(world, d)).collect(),
        }
    }

    /// Whether there are no diagnostics.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of diagnostics.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Error and warning counts.
    pub fn summary(&self) -> DiagnosticSummary {
        DiagnosticSummary {
            errors: self.errors().count(),
            warnings: self.warnings().count(),
        }
    }

    /// All diagnostics in the order the compiler reported them.
    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticInfo> {
        self.items.iter()
    }

    /// Errors only.
    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticInfo> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Warnings only.
    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticInfo> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    /// Drop diagnostics raised inside packages.
    pub fn without_packages(self) -> Self {
        Self {
            items: self
                .items
                .into_iter()
                .filter(|d| !d.path.as_deref().is_some_and(|p| p.starts_with('@')))
                .collect(),
        }
    }

    /// Format with custom options. Errors come before warnings.
    pub fn render(&self, options: &DiagnosticOptions) -> String {
        let mut sorted: Vec<_> = self.items.iter().collect();
        sorted.sort_by_key(|d| d.severity == Severity::Warning);

        let mut output = String::new();
        for (i, diag) in sorted.into_iter().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            format_info(&mut output, diag, options);
        }
        output
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticInfo;
    type IntoIter = std::slice::Iter<'a, DiagnosticInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&DiagnosticOptions::default()))
    }
}

/// One diagnostic with its source location resolved.
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    /// Error or warning.
    pub severity: Severity,
    /// The message.
    pub message: String,
    /// File the span points into, `@ns/name/...` for package files.
    pub path: Option<String>,
    /// Line (1-indexed).
    pub line: Option<usize>,
    /// Column (1-indexed).
    pub column: Option<usize>,
    /// The first source line of the span.
    pub snippet: Option<String>,
    /// Hints.
    pub hints: Vec<String>,
    /// Call and show-rule traces, innermost first.
    pub traces: Vec<String>,
}

impl DiagnosticInfo {
    /// Resolve a single diagnostic.
    pub fn resolve<W: World>(world: &W, diag: &SourceDiagnostic) -> Self {
        let location = SpanLocation::find(world, diag.span);
        let traces = diag
            .trace
            .iter()
            .filter(|t| !matches!(t.v, Tracepoint::Import))
            .map(|t| match SpanLocation::find(world, t.span) {
                Some(loc) => format!("{} ({}:{}:{})", t.v, loc.path, loc.line, loc.column),
                None => t.v.to_string(),
            })
            .collect();

        Self {
            severity: diag.severity,
            message: diag.message.to_string(),
            path: location.as_ref().map(|l| l.path.clone()),
            line: location.as_ref().map(|l| l.line),
            column: location.as_ref().map(|l| l.column),
            snippet: location.map(|l| l.text),
            hints: diag.hints.iter().map(|h| h.to_string()).collect(),
            traces,
        }
    }
}

impl fmt::Display for DiagnosticInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut output = String::new();
        format_info(&mut output, self, &DiagnosticOptions::default());
        f.write_str(&output)
    }
}

struct SpanLocation {
    path: String,
    line: usize,
    column: usize,
    text: String,
}

impl SpanLocation {
    fn find<W: World>(world: &W, span: Span) -> Option<Self> {
        let id = span.id()?;
        let source = world.source(id).ok()?;
        let range = source.range(span)?;
        let text = source.text();

        let line_start = text[..range.start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = text[range.start..].find('\n').map_or(text.len(), |i| range.start + i);

        let file = id.vpath().as_rootless_path().to_string_lossy();
        let path = match id.package() {
            Some(pkg) => format!("@{}/{}/{}", pkg.namespace, pkg.name, file),
            None => file.into_owned(),
        };

        Some(Self {
            path,
            line: text[..range.start].matches('\n').count() + 1,
            column: text[line_start..range.start].chars().count() + 1,
            text: text[line_start..line_end].to_string(),
        })
    }
}
