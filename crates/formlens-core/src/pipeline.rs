//! End-to-end extraction: input → strategy → parser → summary.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{FormlensError, Result};
use crate::input::DocumentInput;
use crate::layout::{HttpLayoutService, LayoutStrategy, PollPolicy};
use crate::models::config::{FormlensConfig, StrategyKind};
use crate::models::form::ExtractedPdfData;
use crate::progress::{ProgressReporter, ProgressSink, STEP_ACQUIRE, STEP_FINALIZE};
use crate::strategy::ExtractionStrategy;
use crate::vision::{HttpVisionService, VisionStrategy};

/// Phase of an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Acquire,
    Analyze,
    Finalize,
    Done,
}

/// State of one extraction call. Never outlives the call.
#[derive(Debug)]
pub struct ExtractionJob<'a> {
    pub input: &'a DocumentInput,
    pub strategy: &'static str,
    pub phase: JobPhase,
    pub cancel: CancellationToken,
}

impl ExtractionJob<'_> {
    fn advance(&mut self, phase: JobPhase) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(FormlensError::Cancelled);
        }
        debug!("Job phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        Ok(())
    }
}

/// Runs extractions with one configured strategy.
pub struct FormExtractor {
    strategy: Box<dyn ExtractionStrategy>,
}

impl FormExtractor {
    pub fn new(strategy: Box<dyn ExtractionStrategy>) -> Self {
        Self { strategy }
    }

    /// Build the HTTP-backed strategy selected by `config.strategy`.
    pub fn from_config(config: &FormlensConfig) -> Result<Self> {
        let strategy: Box<dyn ExtractionStrategy> = match config.strategy {
            StrategyKind::Layout => Box::new(LayoutStrategy::new(
                HttpLayoutService::new(&config.layout)?,
                PollPolicy::from(&config.layout),
            )),
            StrategyKind::Vision => Box::new(VisionStrategy::new(
                HttpVisionService::new(&config.vision)?,
                config.render.clone(),
            )),
        };
        Ok(Self::new(strategy))
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Extract fields from `input`.
    ///
    /// Progress goes to `sink` when given; cancellation is honored at phase
    /// boundaries and while waiting on the back-end.
    pub async fn extract(
        &self,
        input: &DocumentInput,
        sink: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<ExtractedPdfData> {
        let start = Instant::now();
        let mut progress = ProgressReporter::new(sink);
        let mut job = ExtractionJob {
            input,
            strategy: self.strategy.name(),
            phase: JobPhase::Acquire,
            cancel: cancel.clone(),
        };

        info!(
            "Extracting {} bytes ({}) with {} strategy",
            input.bytes().len(),
            input.content_type(),
            job.strategy
        );
        progress.report(STEP_ACQUIRE, "Reading file", 5);

        job.advance(JobPhase::Analyze)?;
        let analysis = self.strategy.analyze(job.input, &mut progress, &job.cancel).await?;

        job.advance(JobPhase::Finalize)?;
        progress.report(STEP_FINALIZE, "Parsing results", 90);
        let data = self.strategy.parse(&analysis);

        job.phase = JobPhase::Done;
        progress.report(STEP_FINALIZE, "Extraction complete", 100);

        info!(
            "Extracted {} fields in {} sections ({}ms)",
            data.form_fields.len(),
            data.sections.len(),
            start.elapsed().as_millis()
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PageImage;
    use crate::layout::{LayoutService, OperationHandle};
    use crate::models::config::RenderConfig;
    use crate::pdf::{RasterRenderer, fixtures};
    use crate::models::layout::{
        AnalyzeResult, KeyValueElement, KeyValuePair, LayoutPage, OperationStatus, SelectionMark,
    };
    use crate::progress::ProgressUpdate;
    use crate::vision::VisionService;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeLayout {
        polls: AtomicU32,
        submit_status: Option<u16>,
    }

    impl FakeLayout {
        fn new() -> Self {
            Self {
                polls: AtomicU32::new(0),
                submit_status: None,
            }
        }

        fn payload() -> AnalyzeResult {
            AnalyzeResult {
                pages: vec![LayoutPage {
                    page_number: 1,
                    selection_marks: vec![SelectionMark {
                        state: "selected".to_string(),
                        confidence: Some(0.8),
                    }],
                }],
                key_value_pairs: vec![KeyValuePair {
                    key: KeyValueElement { content: "Name".to_string() },
                    value: Some(KeyValueElement { content: "Jane Doe".to_string() }),
                    confidence: None,
                }],
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl LayoutService for FakeLayout {
        async fn submit(&self, _bytes: &[u8], content_type: &str) -> Result<OperationHandle> {
            assert_eq!(content_type, "application/pdf");
            match self.submit_status {
                Some(status) => Err(FormlensError::AnalysisService {
                    status,
                    body: "quota exceeded".to_string(),
                }),
                None => Ok(OperationHandle::new("https://service/ops/1")),
            }
        }

        async fn status(&self, _handle: &OperationHandle) -> Result<OperationStatus> {
            let attempt = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(OperationStatus {
                status: if attempt < 3 { "running" } else { "succeeded" }.to_string(),
                analyze_result: (attempt >= 3).then(Self::payload),
                error: None,
            })
        }
    }

    struct FakeVision {
        reply: String,
        pages_seen: Arc<Mutex<Vec<u32>>>,
    }

    #[async_trait]
    impl VisionService for FakeVision {
        async fn invoke(&self, prompt: &str, pages: &[PageImage]) -> Result<String> {
            assert!(prompt.contains("OUTPUT FORMAT"));
            *self.pages_seen.lock().unwrap() = pages.iter().map(|p| p.page_number).collect();
            Ok(self.reply.clone())
        }
    }

    fn pdf_input() -> DocumentInput {
        DocumentInput::new(b"%PDF-1.7 fake".to_vec(), "application/pdf").unwrap()
    }

    fn png_input() -> DocumentInput {
        let img = image::DynamicImage::new_rgb8(8, 8);
        let mut data = Vec::new();
        img.write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png).unwrap();
        DocumentInput::new(data, "image/png").unwrap()
    }

    fn layout_extractor(service: FakeLayout) -> FormExtractor {
        FormExtractor::new(Box::new(LayoutStrategy::new(service, PollPolicy::default())))
    }

    #[tokio::test(start_paused = true)]
    async fn test_layout_end_to_end() {
        let extractor = layout_extractor(FakeLayout::new());
        let updates = Mutex::new(Vec::<ProgressUpdate>::new());
        let sink = |u: &ProgressUpdate| updates.lock().unwrap().push(u.clone());

        let data = extractor
            .extract(&pdf_input(), Some(&sink), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(data.sections.len(), 2);
        assert_eq!(data.form_fields.len(), 2);
        assert_eq!(
            data.summary,
            "Extracted 2 fields across 2 sections: Form Fields, Checkboxes & Selections"
        );

        let updates = updates.lock().unwrap();
        let percents: Vec<u8> = updates.iter().map(|u| u.percent).collect();
        assert_eq!(percents, vec![5, 10, 30, 31, 32, 80, 90, 100]);
        assert!(updates.iter().all(|u| u.total_steps == 3));
        assert_eq!(updates.last().unwrap().step, STEP_FINALIZE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_sink_is_optional() {
        let extractor = layout_extractor(FakeLayout::new());
        let data = extractor
            .extract(&pdf_input(), None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(data.form_fields.len(), 2);
    }

    #[tokio::test]
    async fn test_submission_error_propagates() {
        let service = FakeLayout {
            submit_status: Some(429),
            ..FakeLayout::new()
        };
        let err = layout_extractor(service)
            .extract(&pdf_input(), None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "analysis service returned 429: quota exceeded");
    }

    #[tokio::test]
    async fn test_cancelled_before_analysis() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = layout_extractor(FakeLayout::new())
            .extract(&pdf_input(), None, &cancel)
            .await;
        assert!(matches!(result, Err(FormlensError::Cancelled)));
    }

    #[tokio::test]
    async fn test_vision_end_to_end() {
        let service = FakeVision {
            reply: "```json\n{\"summary\": \"Intake\", \"sections\": [{\"title\": \"Patient\", \"fields\": [{\"name\": \"Name\", \"value\": \"Jane\", \"type\": \"text\"}]}], \"notes\": []}\n```".to_string(),
            pages_seen: Default::default(),
        };
        let strategy = VisionStrategy::new(service, RenderConfig::default());
        let extractor = FormExtractor::new(Box::new(strategy));
        let updates = Mutex::new(Vec::<u8>::new());
        let sink = |u: &ProgressUpdate| updates.lock().unwrap().push(u.percent);

        let data = extractor
            .extract(&png_input(), Some(&sink), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(extractor.strategy_name(), "vision");
        assert_eq!(data.summary, "Intake");
        assert_eq!(data.form_fields.len(), 1);
        assert_eq!(*updates.lock().unwrap(), vec![5, 15, 30, 40, 80, 90, 100]);
    }

    #[tokio::test]
    async fn test_vision_degrades_without_error() {
        let service = FakeVision {
            reply: "I could not read this form.".to_string(),
            pages_seen: Default::default(),
        };
        let extractor = FormExtractor::new(Box::new(VisionStrategy::new(service, RenderConfig::default())));

        let data = extractor
            .extract(&png_input(), None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(data.summary, "I could not read this form.");
        assert!(data.sections.is_empty());
    }

    #[test]
    fn test_from_config_requires_endpoint() {
        let result = FormExtractor::from_config(&FormlensConfig::default());
        assert!(matches!(result, Err(FormlensError::Config(_))));
    }

    #[tokio::test]
    async fn test_vision_renders_every_pdf_page() {
        let pages_seen = Arc::new(Mutex::new(Vec::new()));
        let service = FakeVision {
            reply: "{\"summary\": \"Three pages\", \"sections\": [], \"notes\": []}".to_string(),
            pages_seen: Arc::clone(&pages_seen),
        };
        let strategy = VisionStrategy::new(service, RenderConfig::default()).with_renderer(Arc::new(RasterRenderer));
        let extractor = FormExtractor::new(Box::new(strategy));
        let updates = Mutex::new(Vec::<(u8, String)>::new());
        let sink = |u: &ProgressUpdate| updates.lock().unwrap().push((u.percent, u.message.clone()));

        let pdf = fixtures::scanned_pdf(&[(16, 16, 0), (16, 16, 128), (16, 16, 255)]);
        let input = DocumentInput::new(pdf, "application/pdf").unwrap();
        let data = extractor
            .extract(&input, Some(&sink), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(data.summary, "Three pages");
        assert_eq!(*pages_seen.lock().unwrap(), vec![1, 2, 3]);

        let updates = updates.into_inner().unwrap();
        let percents: Vec<u8> = updates.iter().map(|(p, _)| *p).collect();
        assert_eq!(percents, vec![5, 10, 20, 30, 30, 40, 80, 90, 100]);
        assert_eq!(updates[1].1, "Converted page 1/3");
        assert_eq!(updates[3].1, "Converted page 3/3");
        assert_eq!(updates[4].1, "Prepared 3 page image(s)");
    }

    #[tokio::test]
    async fn test_vision_reports_broken_pdf() {
        let service = FakeVision {
            reply: String::new(),
            pages_seen: Default::default(),
        };
        let strategy = VisionStrategy::new(service, RenderConfig::default()).with_renderer(Arc::new(RasterRenderer));
        let result = FormExtractor::new(Box::new(strategy))
            .extract(&pdf_input(), None, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(FormlensError::Pdf(_))));
    }
}
