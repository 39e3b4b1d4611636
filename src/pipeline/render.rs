//! Page rendering: softened backdrop plus fitted text, one PDF page per image.

use std::io::BufWriter;
use std::sync::Arc;

use image::{DynamicImage, Rgba, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_polygon_mut, Blend};
use imageproc::point::Point as CanvasPoint;
use printpdf::{BuiltinFont, Image, ImageTransform, Mm, PdfDocument, Pt};

use super::geometry::Size;
use super::metrics::TextMeasurer;
use super::types::{DrawableRegion, PageArtifact};
use super::OcrError;
use crate::config::RenderConfig;

const DEBUG_RECT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 128]);
const DEBUG_MARK_COLOR: Rgba<u8> = Rgba([0, 0, 255, 128]);
const DEBUG_DOT_RADIUS: i32 = 5;

/// Produces the final page artifact from a backdrop and placed regions.
pub trait PageRenderer: Send + Sync {
    fn render(
        &self,
        background: &RgbImage,
        regions: &[DrawableRegion],
        debug: bool,
    ) -> Result<PageArtifact, OcrError>;
}

/// Single-page PDF. The page is as many points as the image has pixels.
pub struct PdfPageRenderer {
    config: RenderConfig,
    measurer: Arc<dyn TextMeasurer>,
}

impl PdfPageRenderer {
    pub fn new(config: RenderConfig, measurer: Arc<dyn TextMeasurer>) -> Self {
        Self { config, measurer }
    }

    /// PDF baseline position (points, bottom-left origin) for a region on a
    /// page `page_height` points tall.
    ///
    /// The line's top sits at the rect origin lifted by
    /// `baseline_shift_ratio * height`; the baseline is one ascent below it.
    pub fn text_origin(&self, region: &DrawableRegion, page_height: f64) -> (f64, f64) {
        let rect = region.pixel_rect;
        let top = rect.y - f64::from(self.config.baseline_shift_ratio) * rect.height;
        let baseline = top + f64::from(self.measurer.ascent(region.font_size));
        (rect.x, page_height - baseline)
    }
}

impl PageRenderer for PdfPageRenderer {
    fn render(
        &self,
        background: &RgbImage,
        regions: &[DrawableRegion],
        debug: bool,
    ) -> Result<PageArtifact, OcrError> {
        let (width, height) = background.dimensions();
        let overlay = debug;
        let _span = tracing::info_span!("render_page", width, height, regions = regions.len(), overlay).entered();

        let page_w: Mm = Pt(width as f32).into();
        let page_h: Mm = Pt(height as f32).into();

        let (doc, page1, layer1) =
            PdfDocument::new(&self.config.document_title, page_w, page_h, "Page");
        let layer = doc.get_page(page1).get_layer(layer1);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| OcrError::Render(format!("PDF font error: {e}")))?;

        let backdrop = if debug {
            draw_debug_overlays(background, regions)
        } else {
            background.clone()
        };
        Image::from_dynamic_image(&DynamicImage::ImageRgb8(backdrop)).add_to_layer(
            layer.clone(),
            ImageTransform {
                dpi: Some(72.0),
                ..Default::default()
            },
        );

        let mut transcript = String::new();
        for region in regions {
            let (x, y) = self.text_origin(region, f64::from(height));
            layer.use_text(
                region.text.as_str(),
                region.font_size,
                Pt(x as f32).into(),
                Pt(y as f32).into(),
                &font,
            );
            transcript.push_str(&region.text);
            transcript.push('\n');
        }

        let mut buf = BufWriter::new(Vec::new());
        doc.save(&mut buf)
            .map_err(|e| OcrError::Render(format!("PDF save error: {e}")))?;
        let binary_data = buf
            .into_inner()
            .map_err(|e| OcrError::Render(format!("PDF buffer error: {e}")))?;

        tracing::debug!(bytes = binary_data.len(), "Page rendered");

        Ok(PageArtifact {
            binary_data,
            transcript,
            region_count: regions.len(),
            failures: Vec::new(),
        })
    }
}

/// Backdrop copy with translucent region markers: red over each pixel rect,
/// a blue dot at its origin, and the detector quad filled in blue.
pub fn draw_debug_overlays(background: &RgbImage, regions: &[DrawableRegion]) -> RgbImage {
    let (width, height) = background.dimensions();
    let size = Size::of_image(width, height);
    let mut canvas = Blend(DynamicImage::ImageRgb8(background.clone()).to_rgba8());

    for region in regions {
        if let Some(px) = region.pixel_rect.clamped_pixels(width, height) {
            draw_filled_rect_mut(
                &mut canvas,
                imageproc::rect::Rect::at(px.x as i32, px.y as i32).of_size(px.width, px.height),
                DEBUG_RECT_COLOR,
            );
        }

        let origin = region.pixel_rect.origin();
        if origin.x.is_finite() && origin.y.is_finite() {
            draw_filled_circle_mut(
                &mut canvas,
                (origin.x.round() as i32, origin.y.round() as i32),
                DEBUG_DOT_RADIUS,
                DEBUG_MARK_COLOR,
            );
        }

        let quad = region.raw_quad.to_top_left_origin().to_absolute(size);
        if let Some(polygon) = canvas_polygon(&quad.as_path()) {
            draw_polygon_mut(&mut canvas, &polygon, DEBUG_MARK_COLOR);
        }
    }

    DynamicImage::ImageRgba8(canvas.0).to_rgb8()
}

/// Open polygon in integer canvas space. `None` when fewer than three
/// distinct vertices remain.
fn canvas_polygon(path: &[super::geometry::Point]) -> Option<Vec<CanvasPoint<i32>>> {
    let mut points: Vec<CanvasPoint<i32>> = Vec::with_capacity(path.len());
    for p in path {
        if !(p.x.is_finite() && p.y.is_finite()) {
            return None;
        }
        let q = CanvasPoint::new(p.x.round() as i32, p.y.round() as i32);
        if points.last() != Some(&q) {
            points.push(q);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    (points.len() >= 3).then_some(points)
}
