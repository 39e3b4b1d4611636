use serde::{Deserialize, Serialize};

use crate::pipeline::detection::{DetectionOptions, RecognitionLevel};
use crate::pipeline::types::TranscriptOrder;

/// Application-level constants
pub const APP_NAME: &str = "scanlayer";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// ═══════════════════════════════════════════════════════════
// Defaults
// ═══════════════════════════════════════════════════════════

/// Upper bound for the fitted overlay font size, in points.
pub const DEFAULT_MAX_FONT_SIZE: f32 = 100.0;

/// Lower bound for the fitted overlay font size (0.01 scale of the upper bound).
pub const DEFAULT_MIN_FONT_SIZE: f32 = 1.0;

/// Fraction of a region's height the text origin is lifted by when drawn.
pub const DEFAULT_BASELINE_SHIFT_RATIO: f32 = 0.3;

/// Gaussian sigma used to soften the page backdrop.
pub const DEFAULT_BLUR_SIGMA: f32 = 10.0;

/// Opacity of the white veil composited over the blurred backdrop.
pub const DEFAULT_OVERLAY_OPACITY: f32 = 0.5;

pub const DEFAULT_REMOTE_PATH: &str = "/api/v1/vision/";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "scanlayer=info"
}

// ═══════════════════════════════════════════════════════════
// Configuration types
// ═══════════════════════════════════════════════════════════

/// Font fitting bounds for the layout stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub max_font_size: f32,
    pub min_font_size: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_font_size: DEFAULT_MAX_FONT_SIZE,
            min_font_size: DEFAULT_MIN_FONT_SIZE,
        }
    }
}

/// Backdrop softening parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub blur_sigma: f32,
    /// Alpha of the white layer, 0.0 (invisible) to 1.0 (solid white).
    pub overlay_opacity: f32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            blur_sigma: DEFAULT_BLUR_SIGMA,
            overlay_opacity: DEFAULT_OVERLAY_OPACITY,
        }
    }
}

/// Page rendering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub baseline_shift_ratio: f32,
    pub document_title: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            baseline_shift_ratio: DEFAULT_BASELINE_SHIFT_RATIO,
            document_title: "Scanned page".to_string(),
        }
    }
}

/// Remote recognizer endpoint and submission policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Scheme + host, e.g. `https://ocr.example.com`. Required for remote-refine.
    pub base_url: Option<String>,
    pub path: String,
    /// Opaque token sent as the `token` query parameter.
    pub token: String,
    pub request_timeout_secs: u64,
    /// Extra attempts for transient failures (0 = single attempt).
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_in_flight: usize,
    pub jpeg_quality: u8,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            path: DEFAULT_REMOTE_PATH.to_string(),
            token: String::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Top-level configuration for `OcrService`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub detection: DetectionOptions,
    pub layout: LayoutConfig,
    pub background: BackgroundConfig,
    pub render: RenderConfig,
    pub remote: RemoteConfig,
    pub transcript_order: TranscriptOrder,
}

impl OcrConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Apply `SCANLAYER_*` environment variables on top of this config.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("SCANLAYER_REMOTE_URL") {
            self.remote.base_url = Some(url);
        }
        if let Some(token) = lookup("SCANLAYER_REMOTE_TOKEN") {
            self.remote.token = token;
        }
        if let Some(raw) = lookup("SCANLAYER_REMOTE_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.remote.request_timeout_secs = secs,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid SCANLAYER_REMOTE_TIMEOUT_SECS"),
            }
        }
        if let Some(raw) = lookup("SCANLAYER_RECOGNITION_LEVEL") {
            match raw.parse::<RecognitionLevel>() {
                Ok(level) => self.detection.level = level,
                Err(e) => tracing::warn!(value = %raw, "Ignoring SCANLAYER_RECOGNITION_LEVEL: {e}"),
            }
        }
        if let Some(raw) = lookup("SCANLAYER_LANGUAGES") {
            self.detection.languages = raw
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_constants() {
        let config = OcrConfig::default();
        assert_eq!(config.layout.max_font_size, 100.0);
        assert_eq!(config.background.blur_sigma, 10.0);
        assert_eq!(config.background.overlay_opacity, 0.5);
        assert_eq!(config.render.baseline_shift_ratio, 0.3);
        assert_eq!(config.remote.path, "/api/v1/vision/");
        assert!(config.remote.base_url.is_none());
        assert_eq!(config.detection.level, RecognitionLevel::Accurate);
        assert_eq!(config.transcript_order, TranscriptOrder::Arrival);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = OcrConfig::from_json_str(
            r#"{"remote": {"base_url": "http://localhost:9000", "max_retries": 0},
                "detection": {"level": "fast"},
                "transcript_order": "detection"}"#,
        )
        .unwrap();
        assert_eq!(config.remote.base_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.remote.max_retries, 0);
        assert_eq!(config.remote.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.detection.level, RecognitionLevel::Fast);
        assert_eq!(config.transcript_order, TranscriptOrder::Detection);
        assert_eq!(config.layout.max_font_size, DEFAULT_MAX_FONT_SIZE);
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SCANLAYER_REMOTE_URL", "https://ocr.test"),
            ("SCANLAYER_REMOTE_TOKEN", "secret"),
            ("SCANLAYER_REMOTE_TIMEOUT_SECS", "5"),
            ("SCANLAYER_RECOGNITION_LEVEL", "fast"),
            ("SCANLAYER_LANGUAGES", "en-US, ru-RU,,"),
        ]);
        let config = OcrConfig::default()
            .with_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.remote.base_url.as_deref(), Some("https://ocr.test"));
        assert_eq!(config.remote.token, "secret");
        assert_eq!(config.remote.request_timeout_secs, 5);
        assert_eq!(config.detection.level, RecognitionLevel::Fast);
        assert_eq!(config.detection.languages, vec!["en-US", "ru-RU"]);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let config = OcrConfig::default().with_overrides_from(|k| match k {
            "SCANLAYER_REMOTE_TIMEOUT_SECS" => Some("soon".into()),
            "SCANLAYER_RECOGNITION_LEVEL" => Some("turbo".into()),
            _ => None,
        });
        assert_eq!(config.remote.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.detection.level, RecognitionLevel::Accurate);
    }

    #[test]
    fn app_name_is_scanlayer() {
        assert_eq!(APP_NAME, "scanlayer");
    }
}
