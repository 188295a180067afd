//! Full page rendering through the pdfium library.

use std::ops::ControlFlow;
use std::path::PathBuf;

use image::{DynamicImage, RgbaImage};
use pdfium_render::prelude::*;
use tracing::{debug, trace};

use super::{MAX_RENDER_EDGE, PageRenderer, RenderedPage, Result, pages_to_render, target_width};
use crate::error::PdfError;

/// [`PageRenderer`] that rasterizes text, vector content, form data and
/// annotations with pdfium.
///
/// The shared library is bound on each pass, first from `library_dir`
/// (or the working directory), then from the system search path.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRenderer {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    fn bind(&self) -> Result<Pdfium> {
        let dir = self.library_dir.clone().unwrap_or_else(|| PathBuf::from("./"));

        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| PdfError::Unavailable(format!("failed to bind pdfium: {}", e)))?;

        Ok(Pdfium::new(bindings))
    }

    /// Whether the library can be bound.
    pub fn check(&self) -> Result<()> {
        self.bind().map(|_| ())
    }
}

impl PageRenderer for PdfiumRenderer {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn render_pages(
        &self,
        data: &[u8],
        scale: f32,
        max_pages: usize,
        on_page: &mut dyn FnMut(RenderedPage) -> ControlFlow<()>,
    ) -> Result<()> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(|e| PdfError::Parse(e.to_string()))?;

        let pages = document.pages();
        let page_count = pages.len() as u32;
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        let total = pages_to_render(page_count, max_pages);
        debug!("Rendering {} of {} pages with pdfium", total, page_count);

        for (index, page) in pages.iter().enumerate().take(total as usize) {
            let page_number = index as u32 + 1;
            let width = target_width(page.width().value, scale);

            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_maximum_height(MAX_RENDER_EDGE as i32)
                .render_form_data(true)
                .render_annotations(true);

            let bitmap = page.render_with_config(&config).map_err(|e| PdfError::Render {
                page: page_number,
                reason: e.to_string(),
            })?;

            let image = bitmap_to_image(&bitmap, page_number)?;
            trace!("Rendered page {}: {}x{}", page_number, image.width(), image.height());

            let rendered = RenderedPage {
                page_number,
                page_count: total,
                image,
            };
            if on_page(rendered).is_break() {
                debug!("Rendering stopped after page {}", page_number);
                break;
            }
        }

        Ok(())
    }
}

fn bitmap_to_image(bitmap: &PdfBitmap, page: u32) -> Result<DynamicImage> {
    let render_error = |reason: &str| PdfError::Render {
        page,
        reason: reason.to_string(),
    };

    let width = u32::try_from(bitmap.width()).map_err(|_| render_error("negative bitmap width"))?;
    let height = u32::try_from(bitmap.height()).map_err(|_| render_error("negative bitmap height"))?;

    RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| render_error("bitmap buffer does not match its dimensions"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures;

    /// Binds pdfium or skips: the shared library is not present on every host.
    fn renderer() -> Option<PdfiumRenderer> {
        let renderer = PdfiumRenderer::default();
        match renderer.check() {
            Ok(()) => Some(renderer),
            Err(e) => {
                eprintln!("skipping pdfium test: {}", e);
                None
            }
        }
    }

    #[test]
    fn test_missing_library_is_unavailable() {
        let renderer = PdfiumRenderer::new(Some(PathBuf::from("/nonexistent/pdfium")));
        if let Err(e) = renderer.check() {
            assert!(matches!(e, PdfError::Unavailable(_)));
        }
    }

    #[test]
    fn test_text_only_page_is_rendered() {
        let Some(renderer) = renderer() else { return };
        let pdf = fixtures::text_pdf(&["Name: Jane Doe"]);

        let mut pages = Vec::new();
        renderer
            .render_pages(&pdf, 2.0, 0, &mut |page| {
                pages.push((page.page_number, page.page_count, page.image.width()));
                ControlFlow::Continue(())
            })
            .unwrap();

        assert_eq!(pages, vec![(1, 1, 1190)]);
    }

    #[test]
    fn test_pages_arrive_in_order() {
        let Some(renderer) = renderer() else { return };
        let pdf = fixtures::text_pdf(&["Page one", "Page two", "Page three"]);

        let mut numbers = Vec::new();
        renderer
            .render_pages(&pdf, 1.0, 2, &mut |page| {
                numbers.push(page.page_number);
                ControlFlow::Continue(())
            })
            .unwrap();

        assert_eq!(numbers, vec![1, 2]);
    }
}
