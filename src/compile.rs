//! Typst HTML compilation as a retryable [`Engine`].
//!
//! ```ignore
//! let world = AccessWorld::builder(mount.clone(), resolver, main).build()?;
//! let mut engine = TypstEngine::new(world).with_metadata("post-meta");
//!
//! let driver = CompileDriver::new(warmer, &config);
//! let output = driver.run(&mut engine, &discovered.files).await?;
//! println!("{} bytes of HTML", output.html.len());
//! ```

use serde_json::Value as JsonValue;
use tracing::debug;
use typst::Document;
use typst::diag::{Severity, SourceDiagnostic};
use typst::foundations::{Label, Selector};
use typst::introspection::MetadataElem;
use typst::utils::PicoStr;
use typst_html::HtmlDocument;

use crate::bridge::{Attempt, Engine};
use crate::diagnostic::{CompileError, Diagnostics};
use crate::world::AccessWorld;

const HTML_DEVELOPMENT_WARNING: &str = "html export is under active development";

/// A successful HTML compile.
#[derive(Debug)]
pub struct HtmlOutput {
    /// The serialized document.
    pub html: String,
    /// Value of the labeled `#metadata(..)`, if a label was requested and found.
    pub metadata: Option<JsonValue>,
    /// Warnings raised along the way.
    pub warnings: Diagnostics,
}

/// Compiles the main file of an [`AccessWorld`] to HTML.
///
/// Every attempt starts from a clean world cache. When the compile fails
/// and the world recorded read misses, the attempt reports them as
/// [`Attempt::Missing`] instead of surfacing Typst's file-not-found errors.
pub struct TypstEngine {
    world: AccessWorld,
    metadata_label: Option<String>,
}

impl TypstEngine {
    /// Compile `world`.
    pub fn new(world: AccessWorld) -> Self {
        Self {
            world,
            metadata_label: None,
        }
    }

    /// Extract `#metadata(..) <label>` into [`HtmlOutput::metadata`].
    pub fn with_metadata(mut self, label: impl Into<String>) -> Self {
        self.metadata_label = Some(label.into());
        self
    }

    /// The world compiled against.
    pub fn world(&self) -> &AccessWorld {
        &self.world
    }

    fn finish(&self, document: &HtmlDocument, warnings: &[SourceDiagnostic]) -> Result<HtmlOutput, CompileError> {
        let html = typst_html::html(document).map_err(|e| CompileError::html_export(format!("{e:?}")))?;
        let metadata = self
            .metadata_label
            .as_deref()
            .and_then(|label| query_metadata(document, label));

        Ok(HtmlOutput {
            html,
            metadata,
            warnings: Diagnostics::resolve(&self.world, &without_development_warning(warnings)),
        })
    }
}

impl Engine for TypstEngine {
    type Output = HtmlOutput;
    type Error = CompileError;

    fn compile(&mut self) -> Attempt<HtmlOutput, CompileError> {
        self.world.reset();
        let result = typst::compile::<HtmlDocument>(&self.world);

        match result.output {
            Ok(document) => match self.finish(&document, &result.warnings) {
                Ok(output) => Attempt::Done(output),
                Err(err) => Attempt::Failed(err),
            },
            Err(errors) => {
                let misses = self.world.take_misses();
                if !misses.is_empty() {
                    debug!(missing = misses.len(), "compile stopped on unread files");
                    return Attempt::Missing(misses);
                }
                let all = errors.iter().chain(&result.warnings).cloned().collect::<Vec<_>>();
                Attempt::Failed(CompileError::compilation(&self.world, without_development_warning(&all)))
            }
        }
    }
}

fn without_development_warning(diagnostics: &[SourceDiagnostic]) -> Vec<SourceDiagnostic> {
    diagnostics
        .iter()
        .filter(|d| !(d.severity == Severity::Warning && d.message.contains(HTML_DEVELOPMENT_WARNING)))
        .cloned()
        .collect()
}

/// Query `#metadata(..) <label>` from a compiled document.
pub fn query_metadata(document: &HtmlDocument, label: &str) -> Option<JsonValue> {
    let label = Label::new(PicoStr::intern(label))?;
    let elem = document.introspector().query_unique(&Selector::Label(label)).ok()?;

    elem.to_packed::<MetadataElem>()
        .and_then(|meta| serde_json::to_value(&meta.value).ok())
}
