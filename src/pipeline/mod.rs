pub mod background;
pub mod detection;
pub mod geometry;
pub mod layout;
pub mod markup;
pub mod metrics;
pub mod orchestrator;
pub mod preprocess;
pub mod refine;
pub mod remote;
pub mod render;
#[cfg(feature = "ocr-tesseract")]
pub mod tesseract;
pub mod types;

pub use detection::{DetectionError, DetectionOptions, MockTextDetector, RecognitionLevel, TextDetector};
pub use geometry::*;
pub use orchestrator::OcrService;
pub use remote::{HttpRemoteRecognizer, MockRemoteRecognizer, RemoteError, RemoteRecognizer};
pub use render::{PageRenderer, PdfPageRenderer};
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Invalid input image: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error("Page rendering failed: {0}")]
    Render(String),

    #[error("Remote refinement requested but no remote recognizer is configured")]
    RemoteNotConfigured,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for OcrError {
    fn from(e: tokio::task::JoinError) -> Self {
        OcrError::Task(e.to_string())
    }
}
