//! The extraction capability shared by both analysis back-ends.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::input::DocumentInput;
use crate::models::form::ExtractedPdfData;
use crate::layout::parse_layout;
use crate::models::layout::AnalyzeResult;
use crate::progress::ProgressReporter;
use crate::vision::parse_vision;

/// Raw back-end output, handed unchanged to [`ExtractionStrategy::parse`].
#[derive(Debug, Clone)]
pub enum AnalysisResult {
    /// Structured layout payload.
    Layout(AnalyzeResult),
    /// Free-text model response.
    Vision(String),
}

impl AnalysisResult {
    /// The single mapping from back-end output to the reviewer model.
    pub fn to_extracted(&self) -> ExtractedPdfData {
        match self {
            AnalysisResult::Layout(payload) => {
                debug!("Parsing layout payload ({} pages)", payload.pages.len());
                parse_layout(payload)
            }
            AnalysisResult::Vision(text) => {
                debug!("Parsing vision response ({} chars)", text.len());
                parse_vision(text)
            }
        }
    }
}

/// One way of turning a document into [`ExtractedPdfData`].
///
/// `analyze` owns all I/O and reports progress up to 80 %; `parse` is pure.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Run the back-end for this input.
    async fn analyze(
        &self,
        input: &DocumentInput,
        progress: &mut ProgressReporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult>;

    /// Convert the back-end output into the reviewer model.
    fn parse(&self, result: &AnalysisResult) -> ExtractedPdfData {
        result.to_extracted()
    }
}
