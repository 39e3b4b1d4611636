//! Searchable-page OCR: detect text lines on a photographed page, place each
//! line over a softened copy of the page at its detected position and size,
//! and emit a one-page PDF plus a plain-text transcript.

pub mod config;
pub mod pipeline;

pub use config::OcrConfig;
pub use pipeline::{
    DetectionOptions, OcrError, OcrService, PageArtifact, ProcessingMode, RawDetection,
    RecognitionLevel, TextDetector,
};

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// [`config::default_log_filter`]. Later calls are no-ops.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} v{} logging initialized", config::APP_NAME, config::APP_VERSION);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
