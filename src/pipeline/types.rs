use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::geometry::{Quadrilateral, Rect};
use super::remote::RemoteError;

/// One detected line as reported by a text detector: a normalized,
/// bottom-left-origin quad plus the recognized string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub quad: Quadrilateral,
    pub text: String,
}

impl RawDetection {
    pub fn new(quad: Quadrilateral, text: impl Into<String>) -> Self {
        Self {
            quad,
            text: text.into(),
        }
    }
}

/// A placed, sized piece of text ready for the page renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawableRegion {
    pub text: String,
    /// Top-left-origin pixel rectangle covering the glyphs.
    pub pixel_rect: Rect,
    pub font_size: f32,
    /// The detector's quad, untouched (normalized, bottom-left origin).
    pub raw_quad: Quadrilateral,
    /// Position of the source detection in the detector's output.
    pub detection_index: usize,
}

impl DrawableRegion {
    /// Same placement, different text. Used when a remote transcription
    /// replaces the detector's string.
    pub fn with_text(self, text: String) -> Self {
        Self { text, ..self }
    }
}

/// An image crop paired with the region it was cut from.
#[derive(Debug, Clone)]
pub struct CropRequest {
    pub cropped_image: RgbImage,
    pub region: DrawableRegion,
}

/// A region dropped during remote refinement.
#[derive(Debug)]
pub struct RegionFailure {
    pub detection_index: usize,
    pub error: RemoteError,
}

/// Final output of `OcrService::process`.
#[derive(Debug)]
pub struct PageArtifact {
    /// Rendered PDF page.
    pub binary_data: Vec<u8>,
    /// Every included region's text, each followed by `\n`.
    pub transcript: String,
    /// Number of regions drawn on the page.
    pub region_count: usize,
    /// Regions dropped by remote refinement (always empty in direct mode).
    pub failures: Vec<RegionFailure>,
}

/// How region text is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingMode {
    /// Use the detector's strings verbatim.
    #[default]
    Direct,
    /// Re-crop each region and replace its text with a remote transcription.
    RemoteRefine,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::RemoteRefine => "remote-refine",
        }
    }
}

/// Ordering of regions after remote refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptOrder {
    /// Order in which remote responses arrived.
    #[default]
    Arrival,
    /// Original detection order.
    Detection,
}
