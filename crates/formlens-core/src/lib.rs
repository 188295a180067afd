//! Core library for extracting form fields from scanned documents.
//!
//! This crate provides:
//! - Input validation and page rasterization (PDF, JPEG, PNG)
//! - A layout strategy: submit to a document-analysis service, poll, rebuild sections
//! - A vision strategy: send page images to a multimodal model, parse its JSON reply
//! - A single reviewer model ([`ExtractedPdfData`]) shared by both strategies
//! - Progress reporting, cancellation and "filled only" filtering

pub mod error;
pub mod filter;
pub mod input;
pub mod layout;
pub mod models;
pub mod patterns;
pub mod pdf;
pub mod pipeline;
pub mod progress;
pub mod strategy;
pub mod vision;

pub use error::{FormlensError, PdfError, Result};
pub use filter::{filled_count, filter_filled, is_filled};
pub use input::{DocumentInput, InputKind, PageImage};
pub use layout::{HttpLayoutService, LayoutService, LayoutStrategy, PollPolicy};
pub use models::config::{FormlensConfig, LayoutConfig, RenderConfig, StrategyKind, VisionConfig};
pub use models::form::{ExtractedPdfData, FieldType, FieldValue, FormField, FormSection};
pub use pdf::{PageRenderer, PdfiumRenderer, RasterRenderer, renderer_for};
pub use pipeline::{ExtractionJob, FormExtractor, JobPhase};
pub use progress::{ProgressSink, ProgressUpdate};
pub use strategy::{AnalysisResult, ExtractionStrategy};
pub use vision::{HttpVisionService, VisionService, VisionStrategy};

/// Cancellation handle accepted by [`FormExtractor::extract`].
pub use tokio_util::sync::CancellationToken;
