//! Text detection seam.
//!
//! A detector turns page pixels into line-level detections: normalized,
//! bottom-left-origin quads plus the recognized string. Engines are plugged
//! in behind [`TextDetector`]; the pipeline never talks to one directly.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::geometry::Quadrilateral;
use super::types::RawDetection;

/// Speed/accuracy trade-off requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionLevel {
    Fast,
    #[default]
    Accurate,
}

impl RecognitionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Accurate => "accurate",
        }
    }
}

impl fmt::Display for RecognitionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecognitionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "accurate" => Ok(Self::Accurate),
            other => Err(format!("unknown recognition level '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionOptions {
    pub level: RecognitionLevel,
    /// BCP-47 tags such as `en-US`. Empty means the engine's default set.
    pub languages: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Text detector initialization failed: {0}")]
    Init(String),

    #[error("Text detection failed: {0}")]
    Engine(String),
}

/// Line-level text detector.
///
/// Implementations are synchronous and may be CPU heavy; callers run them on
/// the blocking pool. Output order is the engine's reading order.
pub trait TextDetector: Send + Sync {
    fn detect(
        &self,
        image: &RgbImage,
        options: &DetectionOptions,
    ) -> Result<Vec<RawDetection>, DetectionError>;

    /// Engine name for logs.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Returns a fixed detection list regardless of input.
pub struct MockTextDetector {
    detections: Vec<RawDetection>,
    fail_with: Option<String>,
}

impl MockTextDetector {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            detections,
            fail_with: None,
        }
    }

    /// A detector whose every call fails with `DetectionError::Engine`.
    pub fn failing(message: &str) -> Self {
        Self {
            detections: Vec::new(),
            fail_with: Some(message.to_string()),
        }
    }
}

impl TextDetector for MockTextDetector {
    fn detect(
        &self,
        _image: &RgbImage,
        _options: &DetectionOptions,
    ) -> Result<Vec<RawDetection>, DetectionError> {
        match &self.fail_with {
            Some(msg) => Err(DetectionError::Engine(msg.clone())),
            None => Ok(self.detections.clone()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ═══════════════════════════════════════════════════════════
// Tesseract TSV → line detections
// ═══════════════════════════════════════════════════════════

/// Pixel box of a word, top-left origin.
#[derive(Debug, Clone, Copy)]
struct WordBox {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

#[derive(Debug)]
struct LineAccumulator {
    words: Vec<String>,
    bounds: WordBox,
}

/// Group Tesseract TSV word rows (level 5) into one detection per line.
///
/// TSV columns: level page_num block_num par_num line_num word_num left top
/// width height conf text. Lines are keyed by (page, block, paragraph, line)
/// and emitted in that order. Boxes are converted from pixel, top-left
/// origin into normalized, bottom-left-origin quads for an image of
/// `width` x `height`.
pub fn lines_from_tsv(tsv: &str, width: u32, height: u32) -> Vec<RawDetection> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let mut lines: BTreeMap<(u32, u32, u32, u32), LineAccumulator> = BTreeMap::new();

    for row in tsv.lines() {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 || fields[0] != "5" {
            continue;
        }

        let word = fields[11].trim();
        if word.is_empty() {
            continue;
        }

        let Some(key) = parse_key(&fields[1..5]) else {
            continue;
        };
        let Some(bounds) = parse_word_box(&fields[6..10]) else {
            continue;
        };

        lines
            .entry(key)
            .and_modify(|acc| {
                acc.words.push(word.to_string());
                acc.bounds = union(acc.bounds, bounds);
            })
            .or_insert_with(|| LineAccumulator {
                words: vec![word.to_string()],
                bounds,
            });
    }

    let (w, h) = (width as f64, height as f64);
    lines
        .into_values()
        .map(|acc| {
            let b = acc.bounds;
            let quad = Quadrilateral::from_bounds(
                b.left as f64 / w,
                1.0 - (b.bottom as f64 / h),
                b.right as f64 / w,
                1.0 - (b.top as f64 / h),
            );
            RawDetection::new(quad, acc.words.join(" "))
        })
        .collect()
}

fn parse_key(fields: &[&str]) -> Option<(u32, u32, u32, u32)> {
    Some((
        fields[0].parse().ok()?,
        fields[1].parse().ok()?,
        fields[2].parse().ok()?,
        fields[3].parse().ok()?,
    ))
}

fn parse_word_box(fields: &[&str]) -> Option<WordBox> {
    let left: u32 = fields[0].parse().ok()?;
    let top: u32 = fields[1].parse().ok()?;
    let width: u32 = fields[2].parse().ok()?;
    let height: u32 = fields[3].parse().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some(WordBox {
        left,
        top,
        right: left + width,
        bottom: top + height,
    })
}

fn union(a: WordBox, b: WordBox) -> WordBox {
    WordBox {
        left: a.left.min(b.left),
        top: a.top.min(b.top),
        right: a.right.max(b.right),
        bottom: a.bottom.max(b.bottom),
    }
}
