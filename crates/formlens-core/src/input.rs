//! Input normalization: file type validation and page image preparation.

use std::io::Cursor;
use std::ops::ControlFlow;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use tracing::debug;

use crate::error::{FormlensError, Result};
use crate::models::config::RenderConfig;
use crate::pdf::PageRenderer;
use crate::progress::{ProgressReporter, STEP_ACQUIRE, conversion_percent};

const PDF_MAGIC: &[u8] = b"%PDF-";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Supported input kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Page-oriented document.
    Pdf,
    Jpeg,
    Png,
}

impl InputKind {
    /// Resolve a declared MIME type. Parameters after `;` are ignored.
    pub fn from_mime(mime: &str) -> Result<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Ok(Self::Pdf),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            _ => Err(FormlensError::UnsupportedFileType(mime.to_string())),
        }
    }

    /// Resolve a file extension.
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(FormlensError::UnsupportedFileType(format!(".{}", other))),
        }
    }

    /// Detect the kind from leading magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(PDF_MAGIC) {
            Some(Self::Pdf)
        } else if data.starts_with(JPEG_MAGIC) {
            Some(Self::Jpeg)
        } else if data.starts_with(PNG_MAGIC) {
            Some(Self::Png)
        } else {
            None
        }
    }

    /// Canonical MIME type sent to analysis back-ends.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }
}

/// A validated input document.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    bytes: Vec<u8>,
    kind: InputKind,
}

impl DocumentInput {
    /// Validate bytes against a declared content type.
    ///
    /// A generic `application/octet-stream` declaration falls back to
    /// magic-byte detection.
    pub fn new(bytes: Vec<u8>, declared_type: &str) -> Result<Self> {
        let kind = match InputKind::from_mime(declared_type) {
            Ok(kind) => kind,
            Err(err) => {
                let generic = declared_type.trim().eq_ignore_ascii_case("application/octet-stream")
                    || declared_type.trim().is_empty();
                match InputKind::sniff(&bytes) {
                    Some(kind) if generic => kind,
                    _ => return Err(err),
                }
            }
        };

        if bytes.is_empty() {
            return Err(FormlensError::UnsupportedFileType("empty file".to_string()));
        }

        Ok(Self { bytes, kind })
    }

    /// Build from a path, using its extension (or content) to pick the type.
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => InputKind::from_extension(ext)?,
            None => InputKind::sniff(&bytes).ok_or_else(|| {
                FormlensError::UnsupportedFileType(path.display().to_string())
            })?,
        };
        Self::new(bytes, kind.mime_type())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    /// Content-type header value for layout submission.
    pub fn content_type(&self) -> &'static str {
        self.kind.mime_type()
    }
}

/// One page prepared for a multimodal call.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page_number: u32,
    pub width: u32,
    pub height: u32,
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

/// Turn an input into one encoded image per page, in page order.
///
/// Image inputs pass through untouched. Documents are rendered page by page
/// and JPEG-encoded; progress moves linearly across 0 - 30 %.
pub fn prepare_page_images(
    input: &DocumentInput,
    config: &RenderConfig,
    renderer: &dyn PageRenderer,
    progress: &mut ProgressReporter<'_>,
) -> Result<Vec<PageImage>> {
    if input.kind().is_image() {
        return image_page(input, progress).map(|page| vec![page]);
    }

    render_page_images(input.bytes(), config, renderer, &mut |done, total| {
        progress.report(
            STEP_ACQUIRE,
            format!("Converted page {}/{}", done, total),
            conversion_percent(done, total),
        );
        ControlFlow::Continue(())
    })
}

/// Single page for an image input, passed through as-is.
pub fn image_page(input: &DocumentInput, progress: &mut ProgressReporter<'_>) -> Result<PageImage> {
    let (width, height) = ImageReader::new(Cursor::new(input.bytes()))
        .with_guessed_format()?
        .into_dimensions()?;
    progress.report(STEP_ACQUIRE, "Image ready", 15);

    Ok(PageImage {
        page_number: 1,
        width,
        height,
        mime_type: input.kind().mime_type(),
        data: input.bytes().to_vec(),
    })
}

/// Render and JPEG-encode the pages of a PDF.
///
/// `on_page` receives `(done, total)` after each page is encoded; breaking
/// stops rendering and fails with [`FormlensError::Cancelled`].
pub fn render_page_images(
    data: &[u8],
    config: &RenderConfig,
    renderer: &dyn PageRenderer,
    on_page: &mut dyn FnMut(usize, usize) -> ControlFlow<()>,
) -> Result<Vec<PageImage>> {
    let mut pages = Vec::new();
    let mut encode_error = None;
    let mut stopped = false;

    renderer.render_pages(data, config.scale, config.max_pages, &mut |rendered| {
        match encode_jpeg(&rendered.image, rendered.page_number, config.jpeg_quality) {
            Ok(page) => pages.push(page),
            Err(e) => {
                encode_error = Some(e);
                return ControlFlow::Break(());
            }
        }

        let flow = on_page(pages.len(), rendered.page_count as usize);
        stopped = flow.is_break();
        flow
    })?;

    if let Some(e) = encode_error {
        return Err(e);
    }
    if stopped {
        return Err(FormlensError::Cancelled);
    }

    debug!("Prepared {} page images with {}", pages.len(), renderer.name());
    Ok(pages)
}

fn encode_jpeg(img: &DynamicImage, page_number: u32, quality: u8) -> Result<PageImage> {
    let rgb = img.to_rgb8();
    let mut data = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut data), quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;

    Ok(PageImage {
        page_number,
        width: rgb.width(),
        height: rgb.height(),
        mime_type: "image/jpeg",
        data,
    })
}
