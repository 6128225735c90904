//! Compilation error type.

use thiserror::Error;
use typst::World;
use typst::diag::SourceDiagnostic;

use super::info::Diagnostics;

/// A compile that failed inside the engine.
///
/// Missing resources are not reported here; the driver turns them into
/// [`BridgeError::MissingResources`](crate::BridgeError::MissingResources).
///
/// ```ignore
/// match driver.run(&mut engine, &expected).await {
///     Ok(output) => publish(output.html),
///     Err(BridgeError::Compile(CompileError::Compilation { diagnostics })) => {
///         for diag in diagnostics.errors() {
///             eprintln!("{}", diag.message);
///         }
///     }
///     Err(err) => eprintln!("{err}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum CompileError {
    /// Typst reported errors.
    #[error("{diagnostics}")]
    Compilation {
        /// The resolved diagnostics.
        diagnostics: Diagnostics,
    },

    /// HTML export failed.
    #[error("HTML export failed: {message}")]
    HtmlExport {
        /// Error message from typst_html.
        message: String,
    },
}

impl CompileError {
    /// Resolve raw diagnostics against `world`.
    pub fn compilation<W: World>(world: &W, raw: Vec<SourceDiagnostic>) -> Self {
        Self::Compilation {
            diagnostics: Diagnostics::resolve(world, &raw),
        }
    }

    /// An HTML export error.
    pub fn html_export(message: impl Into<String>) -> Self {
        Self::HtmlExport {
            message: message.into(),
        }
    }

    /// The diagnostics, if this is a compilation error.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::Compilation { diagnostics } => Some(diagnostics),
            Self::HtmlExport { .. } => None,
        }
    }
}
