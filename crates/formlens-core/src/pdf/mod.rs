//! PDF page rasterization.

mod extractor;
mod pdfium;

#[cfg(test)]
pub(crate) mod fixtures;

pub use extractor::{PdfExtractor, RasterRenderer};
pub use pdfium::PdfiumRenderer;

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;
use tracing::{info, warn};

use crate::error::PdfError;
use crate::models::config::RenderConfig;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Upper bound on either edge of a rendered page, in pixels.
pub const MAX_RENDER_EDGE: u32 = 10_000;

/// One rendered page handed to the caller.
pub struct RenderedPage {
    /// 1-indexed page number.
    pub page_number: u32,
    /// Pages that will be rendered in this pass.
    pub page_count: u32,
    pub image: DynamicImage,
}

/// Turns document pages into raster images.
pub trait PageRenderer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Render pages in document order at `scale` pixels per point.
    ///
    /// `max_pages == 0` renders every page. Rendering stops early when
    /// `on_page` breaks.
    fn render_pages(
        &self,
        data: &[u8],
        scale: f32,
        max_pages: usize,
        on_page: &mut dyn FnMut(RenderedPage) -> ControlFlow<()>,
    ) -> Result<()>;
}

/// Number of pages a pass renders given the document's page count.
pub(crate) fn pages_to_render(page_count: u32, max_pages: usize) -> u32 {
    if max_pages > 0 && (max_pages as u64) < page_count as u64 {
        max_pages as u32
    } else {
        page_count
    }
}

/// Pixel width for a page `points` wide at `scale`, kept within [1, MAX_RENDER_EDGE].
pub(crate) fn target_width(points: f32, scale: f32) -> u32 {
    let width = (points * scale).round();
    if !width.is_finite() || width < 1.0 {
        1
    } else {
        (width as u32).min(MAX_RENDER_EDGE)
    }
}

/// Pdfium when the library can be bound, embedded page rasters otherwise.
pub fn renderer_for(config: &RenderConfig) -> Arc<dyn PageRenderer> {
    let pdfium = PdfiumRenderer::new(config.pdfium_library_dir.as_ref().map(PathBuf::from));

    match pdfium.check() {
        Ok(()) => {
            info!("Rendering pages with pdfium");
            Arc::new(pdfium)
        }
        Err(e) => {
            warn!("{}; falling back to embedded page rasters", e);
            Arc::new(RasterRenderer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_to_render() {
        assert_eq!(pages_to_render(5, 0), 5);
        assert_eq!(pages_to_render(5, 2), 2);
        assert_eq!(pages_to_render(2, 10), 2);
    }

    #[test]
    fn test_target_width_is_bounded() {
        assert_eq!(target_width(612.0, 2.0), 1224);
        assert_eq!(target_width(0.0, 2.0), 1);
        assert_eq!(target_width(200_000.0, 2.0), MAX_RENDER_EDGE);
        assert_eq!(target_width(f32::NAN, 2.0), 1);
    }

    #[test]
    fn test_renderer_for_always_yields_a_renderer() {
        let config = RenderConfig {
            pdfium_library_dir: Some("/nonexistent/pdfium".to_string()),
            ..Default::default()
        };
        let renderer = renderer_for(&config);
        assert!(["pdfium", "embedded-raster"].contains(&renderer.name()));
    }
}
