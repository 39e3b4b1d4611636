//! Turns raw detections into drawable regions: a top-left-origin pixel
//! rectangle plus a font size that makes the overlay fill the detected width.

use std::sync::Arc;

use super::geometry::Size;
use super::metrics::TextMeasurer;
use super::types::{DrawableRegion, RawDetection};
use crate::config::LayoutConfig;

pub struct LayoutReconstructor {
    measurer: Arc<dyn TextMeasurer>,
    config: LayoutConfig,
}

impl LayoutReconstructor {
    pub fn new(measurer: Arc<dyn TextMeasurer>, config: LayoutConfig) -> Self {
        Self { measurer, config }
    }

    /// Resolve one detection against an image of `image_size` pixels.
    pub fn reconstruct(
        &self,
        detection: &RawDetection,
        detection_index: usize,
        image_size: Size,
    ) -> DrawableRegion {
        // Flip before scaling: the flip constant is in normalized units.
        let rect = detection
            .quad
            .to_top_left_origin()
            .to_absolute(image_size)
            .bounding_rect();

        // The detector anchors at the baseline; move the origin up to the
        // top of the glyphs.
        let rect = rect.translated(0.0, -rect.height);

        let font_size = fit_font_size(
            self.measurer.as_ref(),
            &detection.text,
            rect.width as f32,
            &self.config,
        );

        DrawableRegion {
            text: detection.text.clone(),
            pixel_rect: rect,
            font_size,
            raw_quad: detection.quad,
            detection_index,
        }
    }

    /// Resolve every detection, preserving detector order.
    pub fn reconstruct_all(&self, detections: &[RawDetection], image_size: Size) -> Vec<DrawableRegion> {
        let regions: Vec<DrawableRegion> = detections
            .iter()
            .enumerate()
            .map(|(i, d)| self.reconstruct(d, i, image_size))
            .collect();

        tracing::debug!(
            regions = regions.len(),
            width = image_size.width,
            height = image_size.height,
            "Layout reconstructed"
        );

        regions
    }
}

/// Largest font size at which `text` fits on one line within `target_width`.
///
/// Measures at the upper bound, scales by `target_width / natural_width`,
/// then clamps into `[min_font_size, max_font_size]`.
pub fn fit_font_size(
    measurer: &dyn TextMeasurer,
    text: &str,
    target_width: f32,
    config: &LayoutConfig,
) -> f32 {
    let max = config.max_font_size;
    let min = config.min_font_size.min(max);

    let natural_width = measurer.measure_width(text, max);
    if natural_width <= 0.0 || !target_width.is_finite() {
        return max;
    }

    let scaled = max * (target_width.max(0.0) / natural_width);
    scaled.clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::geometry::Quadrilateral;
    use crate::pipeline::metrics::HelveticaMetrics;

    fn reconstructor() -> LayoutReconstructor {
        LayoutReconstructor::new(Arc::new(HelveticaMetrics), LayoutConfig::default())
    }

    fn invoice() -> RawDetection {
        RawDetection::new(Quadrilateral::from_bounds(0.1, 0.1, 0.5, 0.2), "Invoice #4471")
    }

    #[test]
    fn invoice_region_geometry() {
        let region = reconstructor().reconstruct(&invoice(), 0, Size::new(1000.0, 1400.0));
        let r = region.pixel_rect;
        assert!((r.width - 400.0).abs() < 1e-6, "width {}", r.width);
        assert!((r.height - 140.0).abs() < 1e-6, "height {}", r.height);
        assert!((r.x - 100.0).abs() < 1e-6);
        // Baseline at 1260px, shifted up by its height.
        assert!((r.y - 1120.0).abs() < 1e-6, "y {}", r.y);
        assert_eq!(region.text, "Invoice #4471");
        assert_eq!(region.raw_quad, invoice().quad);
    }

    #[test]
    fn font_fills_detected_width() {
        let m = HelveticaMetrics;
        let region = reconstructor().reconstruct(&invoice(), 0, Size::new(1000.0, 1400.0));
        // 622.6pt wide at 100pt, so the fit scales down to ~64pt.
        assert!(region.font_size < 100.0);
        let drawn = m.measure_width(&region.text, region.font_size);
        assert!((drawn - 400.0).abs() < 0.5, "drawn width {drawn}");
    }

    #[test]
    fn font_size_monotonic_in_width() {
        let m = HelveticaMetrics;
        let config = LayoutConfig::default();
        let text = "Total due: 1,250.00 EUR";
        let mut previous = 0.0_f32;
        for width in [10.0, 50.0, 120.0, 300.0, 900.0, 5000.0] {
            let size = fit_font_size(&m, text, width, &config);
            assert!(size >= previous, "width {width}: {size} < {previous}");
            assert!(size <= config.max_font_size);
            previous = size;
        }
    }

    #[test]
    fn font_size_capped_for_wide_regions() {
        let size = fit_font_size(&HelveticaMetrics, "a", 10_000.0, &LayoutConfig::default());
        assert_eq!(size, 100.0);
    }

    #[test]
    fn font_size_floor_for_tiny_regions() {
        let size = fit_font_size(
            &HelveticaMetrics,
            "a very long line of small print",
            0.0,
            &LayoutConfig::default(),
        );
        assert_eq!(size, 1.0);
    }

    #[test]
    fn font_size_exact_scale() {
        // "Hello" is 227.8pt wide at 100pt.
        let size = fit_font_size(&HelveticaMetrics, "Hello", 113.9, &LayoutConfig::default());
        assert!((size - 50.0).abs() < 1e-3, "got {size}");
    }

    #[test]
    fn reconstruct_all_keeps_order_and_indices() {
        let detections = vec![
            invoice(),
            RawDetection::new(Quadrilateral::from_bounds(0.1, 0.3, 0.4, 0.35), "Date"),
        ];
        let regions = reconstructor().reconstruct_all(&detections, Size::new(1000.0, 1400.0));
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].text, "Invoice #4471");
        assert_eq!(regions[1].text, "Date");
        assert_eq!(regions[0].detection_index, 0);
        assert_eq!(regions[1].detection_index, 1);
    }
}
