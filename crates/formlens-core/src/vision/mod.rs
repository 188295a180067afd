//! Vision strategy: render pages, ask a multimodal model, parse its reply.

mod client;
mod parser;
mod prompt;

pub use client::{HttpVisionService, VisionService, data_uri};
pub use parser::{locate_payload, parse_vision, selection_state};
pub use prompt::{UNCERTAIN_MARKER, build_prompt};

use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{FormlensError, Result};
use crate::input::{DocumentInput, PageImage, image_page, render_page_images};
use crate::models::config::RenderConfig;
use crate::pdf::{PageRenderer, renderer_for};
use crate::progress::{ProgressReporter, STEP_ACQUIRE, STEP_ANALYZE, conversion_percent};
use crate::strategy::{AnalysisResult, ExtractionStrategy};

/// [`ExtractionStrategy`] backed by a [`VisionService`].
pub struct VisionStrategy<S> {
    service: S,
    render: RenderConfig,
    renderer: Arc<dyn PageRenderer>,
}

impl<S: VisionService> VisionStrategy<S> {
    /// Strategy rendering PDFs with the best renderer available.
    pub fn new(service: S, render: RenderConfig) -> Self {
        let renderer = renderer_for(&render);
        Self {
            service,
            render,
            renderer,
        }
    }

    /// Replace the page renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Page images for `input`. PDF rendering runs on the blocking pool
    /// and stops at the next page once `cancel` fires.
    async fn page_images(
        &self,
        input: &DocumentInput,
        progress: &mut ProgressReporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<PageImage>> {
        if input.kind().is_image() {
            return image_page(input, progress).map(|page| vec![page]);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let data = input.bytes().to_vec();
        let render = self.render.clone();
        let renderer = Arc::clone(&self.renderer);
        let task_cancel = cancel.clone();

        let task = tokio::task::spawn_blocking(move || {
            render_page_images(&data, &render, renderer.as_ref(), &mut |done, total| {
                let _ = tx.send((done, total));
                if task_cancel.is_cancelled() {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
        });

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Page rendering cancelled");
                    return Err(FormlensError::Cancelled);
                }
                update = rx.recv() => match update {
                    Some((done, total)) => progress.report(
                        STEP_ACQUIRE,
                        format!("Converted page {}/{}", done, total),
                        conversion_percent(done, total),
                    ),
                    None => break,
                },
            }
        }

        task.await?
    }
}

#[async_trait]
impl<S: VisionService> ExtractionStrategy for VisionStrategy<S> {
    fn name(&self) -> &'static str {
        "vision"
    }

    async fn analyze(
        &self,
        input: &DocumentInput,
        progress: &mut ProgressReporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult> {
        let pages = self.page_images(input, progress, cancel).await?;
        progress.report(STEP_ACQUIRE, format!("Prepared {} page image(s)", pages.len()), 30);

        if cancel.is_cancelled() {
            return Err(FormlensError::Cancelled);
        }

        let prompt = build_prompt(pages.len());
        progress.report(STEP_ANALYZE, "Sending pages to the vision model", 40);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(FormlensError::Cancelled),
            response = self.service.invoke(&prompt, &pages) => response?,
        };
        info!("Vision model returned {} characters", response.len());
        progress.report(STEP_ANALYZE, "Model response received", 80);

        Ok(AnalysisResult::Vision(response))
    }
}
