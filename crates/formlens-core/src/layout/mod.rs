//! Layout strategy: submit the document, poll the operation, rebuild sections.

mod client;
mod parser;
mod poller;

pub use client::{HttpLayoutService, LayoutService, OperationHandle, operation_handle_from_headers};
pub use parser::{
    DEFAULT_SECTION, EMPTY_PLACEHOLDER, FORM_FIELDS_SECTION, SELECTIONS_SECTION, is_section_header,
    key_value_section, paragraph_sections, parse_layout, selection_section, table_rows,
    table_section,
};
pub use poller::{JobPoller, PollPolicy};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{FormlensError, Result};
use crate::input::DocumentInput;
use crate::progress::{ProgressReporter, STEP_ACQUIRE, STEP_ANALYZE};
use crate::strategy::{AnalysisResult, ExtractionStrategy};

/// [`ExtractionStrategy`] backed by a [`LayoutService`].
pub struct LayoutStrategy<S> {
    service: S,
    policy: PollPolicy,
}

impl<S: LayoutService> LayoutStrategy<S> {
    pub fn new(service: S, policy: PollPolicy) -> Self {
        Self { service, policy }
    }
}

#[async_trait]
impl<S: LayoutService> ExtractionStrategy for LayoutStrategy<S> {
    fn name(&self) -> &'static str {
        "layout"
    }

    async fn analyze(
        &self,
        input: &DocumentInput,
        progress: &mut ProgressReporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult> {
        progress.report(STEP_ACQUIRE, "Submitting document for analysis", 10);

        let handle = self.service.submit(input.bytes(), input.content_type()).await?;
        info!("Layout analysis submitted: {}", handle.as_str());

        if cancel.is_cancelled() {
            return Err(FormlensError::Cancelled);
        }
        progress.report(STEP_ANALYZE, "Document submitted, waiting for analysis", 30);

        let payload = JobPoller::new(&self.service, self.policy)
            .wait(&handle, progress, cancel)
            .await?;
        progress.report(STEP_ANALYZE, "Analysis complete", 80);

        Ok(AnalysisResult::Layout(payload))
    }
}
