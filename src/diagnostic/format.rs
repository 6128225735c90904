//! Diagnostic formatting.

use std::fmt::Write;

use typst::diag::Severity;

use super::info::DiagnosticInfo;
use crate::path::VirtualPath;

/// Options for controlling diagnostic formatting.
///
/// ```ignore
/// let text = diagnostics.render(&DiagnosticOptions::plain().with_hints(false));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticOptions {
    /// Whether to use ANSI colors.
    pub colored: bool,
    /// Whether to print the offending source line.
    pub snippets: bool,
    /// Whether to include hints.
    pub hints: bool,
    /// Whether to include traces.
    pub traces: bool,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        Self {
            colored: cfg!(feature = "colored-diagnostics"),
            snippets: true,
            hints: true,
            traces: true,
        }
    }
}

impl DiagnosticOptions {
    /// Colored terminal output.
    pub fn colored() -> Self {
        Self {
            colored: true,
            ..Self::default()
        }
    }

    /// No ANSI colors.
    pub fn plain() -> Self {
        Self {
            colored: false,
            ..Self::default()
        }
    }

    /// Set whether to include source snippets.
    pub fn with_snippets(mut self, snippets: bool) -> Self {
        self.snippets = snippets;
        self
    }

    /// Set whether to include hints.
    pub fn with_hints(mut self, hints: bool) -> Self {
        self.hints = hints;
        self
    }

    /// Set whether to include traces.
    pub fn with_traces(mut self, traces: bool) -> Self {
        self.traces = traces;
        self
    }
}

#[cfg(feature = "colored-diagnostics")]
fn colorize(text: &str, severity: Severity) -> String {
    use owo_colors::OwoColorize;
    match severity {
        Severity::Error => text.red().to_string(),
        Severity::Warning => text.yellow().to_string(),
    }
}

#[cfg(feature = "colored-diagnostics")]
fn colorize_help(text: &str) -> String {
    use owo_colors::OwoColorize;
    text.cyan().to_string()
}

#[cfg(not(feature = "colored-diagnostics"))]
fn colorize(text: &str, _severity: Severity) -> String {
    text.to_owned()
}

#[cfg(not(feature = "colored-diagnostics"))]
fn colorize_help(text: &str) -> String {
    text.to_owned()
}

struct Painter {
    colored: bool,
}

impl Painter {
    fn severity(&self, text: &str, severity: Severity) -> String {
        if self.colored { colorize(text, severity) } else { text.to_owned() }
    }

    fn help(&self, text: &str) -> String {
        if self.colored { colorize_help(text) } else { text.to_owned() }
    }
}

/// Append one diagnostic to `output`.
pub(crate) fn format_info(output: &mut String, info: &DiagnosticInfo, options: &DiagnosticOptions) {
    let paint = Painter { colored: options.colored };
    let label = match info.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };

    _ = writeln!(output, "{}: {}", paint.severity(label, info.severity), info.message);

    if let (Some(path), Some(line), Some(column)) = (&info.path, info.line, info.column) {
        _ = writeln!(output, "  {} {path}:{line}:{column}", paint.severity("┌─", info.severity));
        if options.snippets
            && let Some(text) = &info.snippet
        {
            let gutter = line.to_string();
            _ = writeln!(output, "{gutter} {} {text}", paint.severity("│", info.severity));
            _ = writeln!(
                output,
                "{:width$} {} {:>col$}",
                "",
                paint.severity("│", info.severity),
                paint.severity("^", info.severity),
                width = gutter.len(),
                col = column,
            );
        }
    }

    if options.traces {
        for trace in &info.traces {
            _ = writeln!(output, "  {} {trace}", paint.help("="));
        }
    }
    if options.hints {
        for hint in &info.hints {
            _ = writeln!(output, "  {} hint: {hint}", paint.help("="));
        }
    }
}

/// Render the resources a compile gave up on, one per line.
pub fn format_missing(paths: &[VirtualPath], attempts: usize, options: &DiagnosticOptions) -> String {
    let paint = Painter { colored: options.colored };
    let mut output = String::new();
    _ = writeln!(
        output,
        "{}: {} resource{} still missing after {attempts} attempt{}",
        paint.severity("error", Severity::Error),
        paths.len(),
        if paths.len() == 1 { "" } else { "s" },
        if attempts == 1 { "" } else { "s" },
    );
    for path in paths {
        _ = writeln!(output, "  {} {path}", paint.severity("-", Severity::Error));
    }
    if options.hints {
        _ = writeln!(
            output,
            "  {} hint: check that the files exist and the network is reachable",
            paint.help("="),
        );
    }
    output
}
