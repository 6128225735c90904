//! Diagnostic formatting for Typst compilation errors and warnings.

mod error;
mod format;
mod info;

pub use error::CompileError;
pub use format::{DiagnosticOptions, format_missing};
pub use info::{DiagnosticInfo, DiagnosticSummary, Diagnostics};

pub use typst::diag::{Severity as DiagnosticSeverity, SourceDiagnostic};
