//! Embedded-raster fallback for scanned PDFs using lopdf.

use std::ops::ControlFlow;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace};

use super::{MAX_RENDER_EDGE, PageRenderer, RenderedPage, Result, pages_to_render, target_width};
use crate::error::PdfError;

/// US Letter, used when a page carries no MediaBox.
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Largest embedded raster accepted, in pixels.
const MAX_RASTER_PIXELS: usize = MAX_RENDER_EDGE as usize * MAX_RENDER_EDGE as usize;

/// lopdf document wrapper giving access to page sizes and embedded rasters.
pub struct PdfExtractor {
    document: Option<Document>,
}

impl PdfExtractor {
    /// Create a new extractor with no document loaded.
    pub fn new() -> Self {
        Self { document: None }
    }

    /// Load a document from bytes.
    pub fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or(PdfError::Parse("No document loaded".to_string()))
    }

    fn page_id(&self, page: u32) -> Result<ObjectId> {
        let doc = self.document()?;
        doc.get_pages()
            .get(&page)
            .copied()
            .ok_or(PdfError::InvalidPage(page))
    }

    /// Page size in points (width, height), honoring inherited MediaBox.
    pub fn page_size(&self, page: u32) -> Result<(f32, f32)> {
        let doc = self.document()?;
        let page_id = self.page_id(page)?;

        let media_box = self
            .inherited_entry(doc, page_id, b"MediaBox")
            .and_then(|obj| match obj {
                Object::Array(values) if values.len() == 4 => {
                    let nums: Vec<f32> = values.iter().filter_map(as_number).collect();
                    (nums.len() == 4).then(|| ((nums[2] - nums[0]).abs(), (nums[3] - nums[1]).abs()))
                }
                _ => None,
            });

        Ok(media_box.unwrap_or(DEFAULT_PAGE_SIZE))
    }

    /// Raster images referenced by a page's XObject resources.
    ///
    /// Images in unsupported encodings are skipped; images larger than
    /// the render limit are an error.
    pub fn extract_images(&self, page: u32) -> Result<Vec<DynamicImage>> {
        let doc = self.document()?;
        let page_id = self.page_id(page)?;

        let mut images = Vec::new();

        if let Some(Object::Dictionary(resources)) = self.inherited_entry(doc, page_id, b"Resources") {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
                    for (_name, obj_ref) in xobj_dict.iter() {
                        if let Ok((_, obj)) = doc.dereference(obj_ref) {
                            if let Some(img) = image_from_object(doc, obj, page)? {
                                images.push(img);
                            }
                        }
                    }
                }
            }
        }

        debug!("Extracted {} images from page {}", images.len(), page);
        Ok(images)
    }

    /// Largest raster on `page`, resampled to the page width times `scale`.
    pub fn render_page(&self, page: u32, scale: f32) -> Result<DynamicImage> {
        let raster = self
            .extract_images(page)?
            .into_iter()
            .max_by_key(|img| img.width() as u64 * img.height() as u64)
            .ok_or_else(|| PdfError::Render {
                page,
                reason: "page has no raster content".to_string(),
            })?;

        let (page_width, _) = self.page_size(page)?;
        let width = target_width(page_width, scale);
        let (w, h) = raster.dimensions();
        let height = ((h as f64 * width as f64) / w as f64)
            .round()
            .clamp(1.0, MAX_RENDER_EDGE as f64) as u32;

        trace!("Rendering page {}: {}x{} raster -> {}x{}", page, w, h, width, height);

        if (w, h) == (width, height) {
            return Ok(raster);
        }
        Ok(raster.resize_exact(width, height, FilterType::Triangle))
    }

    /// Look up a page attribute, walking up the page tree for inherited values.
    fn inherited_entry(&self, doc: &Document, node_id: ObjectId, key: &[u8]) -> Option<Object> {
        let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
            return None;
        };

        if let Some(value) = dereferenced(doc, dict, key) {
            return Some(value);
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.inherited_entry(doc, *parent_id, key),
            _ => None,
        }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn image_from_object(doc: &Document, obj: &Object, page: u32) -> Result<Option<DynamicImage>> {
    let Object::Stream(stream) = obj else {
        return Ok(None);
    };
    let dict = &stream.dict;

    let is_image = dict
        .get(b"Subtype")
        .ok()
        .and_then(|o| o.as_name().ok())
        .is_some_and(|name| name == b"Image");
    if !is_image {
        return Ok(None);
    }

    let (Some(width), Some(height)) = (dimension(dict, b"Width"), dimension(dict, b"Height")) else {
        trace!("Skipping image with missing or invalid dimensions");
        return Ok(None);
    };
    trace!("Found image object: {}x{}", width, height);

    if pixel_count(width, height).is_none() {
        return Err(PdfError::Render {
            page,
            reason: format!("embedded image {}x{} exceeds the raster limit", width, height),
        });
    }

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                return Ok(image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok());
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Skipping image with unsupported filter");
                return Ok(None);
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);

    if bits != 8 {
        trace!("Unsupported bits per component: {}", bits);
        return Ok(None);
    }

    Ok(image_from_raw(&data, width, height, color_space))
}

/// Positive dimension that fits in `u32`.
fn dimension(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    let value = dict.get(key).ok()?.as_i64().ok()?;
    u32::try_from(value).ok().filter(|&v| v > 0)
}

/// `width * height` when it stays within the raster limit.
fn pixel_count(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .filter(|&pixels| pixels <= MAX_RASTER_PIXELS)
}

fn dereferenced(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<Object> {
    let value = dict.get(key).ok()?;
    doc.dereference(value).ok().map(|(_, obj)| obj.clone())
}

fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn image_from_raw(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = pixel_count(width, height)?;
    let rgb_len = pixels.checked_mul(3)?;

    let rgba: Vec<u8> = match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= rgb_len => data[..rgb_len]
            .chunks(3)
            .flat_map(|c| [c[0], c[1], c[2], 255])
            .collect(),
        b"DeviceGray" | b"G" if data.len() >= pixels => data[..pixels]
            .iter()
            .flat_map(|&g| [g, g, g, 255])
            .collect(),
        _ => {
            trace!(
                "Could not decode image: colorspace={:?}, data_len={}",
                String::from_utf8_lossy(color_space),
                data.len()
            );
            return None;
        }
    };

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

/// [`PageRenderer`] for scanned forms: each page becomes its largest
/// embedded raster. Pages without one fail with [`PdfError::Render`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterRenderer;

impl PageRenderer for RasterRenderer {
    fn name(&self) -> &'static str {
        "embedded-raster"
    }

    fn render_pages(
        &self,
        data: &[u8],
        scale: f32,
        max_pages: usize,
        on_page: &mut dyn FnMut(RenderedPage) -> ControlFlow<()>,
    ) -> Result<()> {
        let mut extractor = PdfExtractor::new();
        extractor.load(data)?;

        let total = pages_to_render(extractor.page_count(), max_pages);
        for page_number in 1..=total {
            let image = extractor.render_page(page_number, scale)?;
            let rendered = RenderedPage {
                page_number,
                page_count: total,
                image,
            };
            if on_page(rendered).is_break() {
                break;
            }
        }
        Ok(())
    }
}
