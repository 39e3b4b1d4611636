//! Page pipeline: decode → (detect ‖ soften backdrop) → layout →
//! optional remote refinement → render.

use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;

use super::background::BackgroundCompositor;
use super::detection::TextDetector;
use super::geometry::Size;
use super::layout::LayoutReconstructor;
use super::metrics::{HelveticaMetrics, TextMeasurer};
use super::preprocess::decode_image;
use super::refine::{RefineOutcome, RemoteRefiner};
use super::remote::{HttpRemoteRecognizer, RemoteRecognizer};
use super::render::{PageRenderer, PdfPageRenderer};
use super::types::{PageArtifact, ProcessingMode};
use super::OcrError;
use crate::config::OcrConfig;

/// Turns a photographed page into a searchable PDF page plus transcript.
///
/// Components are trait objects so engines, the remote service and the
/// output format can be swapped (or mocked) independently.
pub struct OcrService {
    detector: Arc<dyn TextDetector>,
    measurer: Arc<dyn TextMeasurer>,
    renderer: Option<Arc<dyn PageRenderer>>,
    remote: Option<Arc<dyn RemoteRecognizer>>,
    config: OcrConfig,
}

impl OcrService {
    pub fn new(detector: Arc<dyn TextDetector>, config: OcrConfig) -> Self {
        Self {
            detector,
            measurer: Arc::new(HelveticaMetrics),
            renderer: None,
            remote: None,
            config,
        }
    }

    pub fn with_remote_recognizer(mut self, recognizer: Arc<dyn RemoteRecognizer>) -> Self {
        self.remote = Some(recognizer);
        self
    }

    /// Attach an HTTP recognizer built from `config.remote`.
    pub fn with_http_remote(self) -> Result<Self, OcrError> {
        let recognizer = HttpRemoteRecognizer::from_config(&self.config.remote)?;
        tracing::info!(endpoint = recognizer.endpoint(), "Remote recognizer configured");
        Ok(self.with_remote_recognizer(Arc::new(recognizer)))
    }

    pub fn with_text_measurer(mut self, measurer: Arc<dyn TextMeasurer>) -> Self {
        self.measurer = measurer;
        self
    }

    /// Replace the default PDF renderer.
    pub fn with_page_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Process one encoded image (JPEG, PNG or TIFF).
    pub async fn process(
        &self,
        image_bytes: &[u8],
        mode: ProcessingMode,
        debug: bool,
    ) -> Result<PageArtifact, OcrError> {
        let bytes = image_bytes.to_vec();
        let image = tokio::task::spawn_blocking(move || decode_image(&bytes)).await??;
        self.process_image(image, mode, debug).await
    }

    /// Process an already decoded image.
    pub async fn process_image(
        &self,
        image: DynamicImage,
        mode: ProcessingMode,
        debug: bool,
    ) -> Result<PageArtifact, OcrError> {
        let start = Instant::now();
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidInput("Image has zero dimensions".into()));
        }

        let remote = match mode {
            ProcessingMode::RemoteRefine => {
                Some(self.remote.clone().ok_or(OcrError::RemoteNotConfigured)?)
            }
            ProcessingMode::Direct => None,
        };

        let overlay = debug;
        tracing::info!(
            width,
            height,
            mode = mode.as_str(),
            detector = self.detector.name(),
            overlay,
            "Processing page"
        );

        let rgb = Arc::new(image.to_rgb8());

        // Detection and backdrop softening only share the read-only source.
        let detect = {
            let detector = Arc::clone(&self.detector);
            let options = self.config.detection.clone();
            let rgb = Arc::clone(&rgb);
            tokio::task::spawn_blocking(move || detector.detect(&rgb, &options))
        };
        let compose = {
            let compositor = BackgroundCompositor::new(self.config.background.clone());
            let rgb = Arc::clone(&rgb);
            tokio::task::spawn_blocking(move || compositor.compose(&rgb))
        };
        let (detected, backdrop) = tokio::join!(detect, compose);
        let detections = detected??;
        let backdrop = backdrop?;

        tracing::debug!(detections = detections.len(), "Detection complete");

        let layout = LayoutReconstructor::new(Arc::clone(&self.measurer), self.config.layout.clone());
        let regions = layout.reconstruct_all(&detections, Size::of_image(width, height));

        let RefineOutcome { regions, failures } = match remote {
            Some(recognizer) => {
                RemoteRefiner::new(recognizer, self.config.remote.clone())
                    .refine(&rgb, regions, self.config.transcript_order)
                    .await
            }
            None => RefineOutcome {
                regions,
                failures: Vec::new(),
            },
        };

        let renderer = self.page_renderer();
        let mut artifact =
            tokio::task::spawn_blocking(move || renderer.render(&backdrop, &regions, debug)).await??;
        artifact.failures = failures;

        tracing::info!(
            regions = artifact.region_count,
            failed = artifact.failures.len(),
            bytes = artifact.binary_data.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Page processed"
        );

        Ok(artifact)
    }

    fn page_renderer(&self) -> Arc<dyn PageRenderer> {
        match &self.renderer {
            Some(r) => Arc::clone(r),
            None => Arc::new(PdfPageRenderer::new(
                self.config.render.clone(),
                Arc::clone(&self.measurer),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::detection::MockTextDetector;
    use crate::pipeline::geometry::Quadrilateral;
    use crate::pipeline::preprocess::tests::make_test_png;
    use crate::pipeline::remote::{MockRemoteRecognizer, RemoteError};
    use crate::pipeline::types::RawDetection;
    use async_trait::async_trait;

    fn invoice() -> RawDetection {
        RawDetection::new(Quadrilateral::from_bounds(0.1, 0.1, 0.5, 0.2), "Invoice #4471")
    }

    fn service(detections: Vec<RawDetection>) -> OcrService {
        OcrService::new(Arc::new(MockTextDetector::new(detections)), OcrConfig::default())
    }

    fn page_png() -> Vec<u8> {
        make_test_png(1000, 1400, [255, 255, 255])
    }

    struct AlwaysUnavailable;

    #[async_trait]
    impl RemoteRecognizer for AlwaysUnavailable {
        async fn recognize(&self, _jpeg: Vec<u8>) -> Result<String, RemoteError> {
            Err(RemoteError::Status {
                status: 400,
                body: "rejected".into(),
            })
        }
    }

    // ── input validation ──

    #[tokio::test]
    async fn undecodable_bytes_are_invalid_input() {
        let err = service(vec![invoice()])
            .process(&[0u8; 256], ProcessingMode::Direct, false)
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn empty_bytes_are_invalid_input() {
        let err = service(vec![])
            .process(&[], ProcessingMode::Direct, false)
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn zero_sized_image_is_invalid_input() {
        let err = service(vec![])
            .process_image(DynamicImage::new_rgb8(0, 0), ProcessingMode::Direct, false)
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::InvalidInput(_)));
    }

    // ── direct mode ──

    #[tokio::test]
    async fn direct_mode_end_to_end() {
        let artifact = service(vec![invoice()])
            .process(&page_png(), ProcessingMode::Direct, false)
            .await
            .unwrap();
        assert_eq!(&artifact.binary_data[0..4], b"%PDF");
        assert_eq!(artifact.transcript, "Invoice #4471\n");
        assert_eq!(artifact.region_count, 1);
        assert!(artifact.failures.is_empty());
    }

    #[tokio::test]
    async fn direct_mode_keeps_detection_order() {
        let detections = vec![
            invoice(),
            RawDetection::new(Quadrilateral::from_bounds(0.1, 0.7, 0.4, 0.75), "ACME Corp"),
            RawDetection::new(Quadrilateral::from_bounds(0.6, 0.05, 0.9, 0.08), "Total: 99.00"),
        ];
        let svc = service(detections);
        let first = svc.process(&page_png(), ProcessingMode::Direct, false).await.unwrap();
        let second = svc.process(&page_png(), ProcessingMode::Direct, false).await.unwrap();
        assert_eq!(first.transcript, "Invoice #4471\nACME Corp\nTotal: 99.00\n");
        assert_eq!(first.transcript, second.transcript);
    }

    #[tokio::test]
    async fn no_detections_renders_empty_page() {
        let artifact = service(vec![])
            .process(&page_png(), ProcessingMode::Direct, true)
            .await
            .unwrap();
        assert_eq!(artifact.transcript, "");
        assert_eq!(artifact.region_count, 0);
        assert_eq!(&artifact.binary_data[0..4], b"%PDF");
    }

    #[tokio::test]
    async fn detector_failure_propagates() {
        let svc = OcrService::new(
            Arc::new(MockTextDetector::failing("engine unavailable")),
            OcrConfig::default(),
        );
        let err = svc
            .process(&page_png(), ProcessingMode::Direct, false)
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::Detection(_)));
    }

    #[tokio::test]
    async fn debug_flag_reaches_renderer() {
        let artifact = service(vec![invoice()])
            .process(&page_png(), ProcessingMode::Direct, true)
            .await
            .unwrap();
        assert_eq!(artifact.transcript, "Invoice #4471\n");
    }

    // ── remote-refine mode ──

    #[tokio::test]
    async fn remote_refine_requires_recognizer() {
        let err = service(vec![invoice()])
            .process(&page_png(), ProcessingMode::RemoteRefine, false)
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::RemoteNotConfigured));
    }

    #[tokio::test]
    async fn remote_refine_replaces_text() {
        let remote = Arc::new(MockRemoteRecognizer::new("<p>Invoice&nbsp;#4471</p>"));
        let svc = service(vec![invoice()]).with_remote_recognizer(remote.clone());

        let artifact = svc
            .process(&page_png(), ProcessingMode::RemoteRefine, false)
            .await
            .unwrap();

        assert_eq!(artifact.transcript, "Invoice\u{a0}#4471\n");
        assert_eq!(artifact.region_count, 1);
        assert_eq!(remote.call_count(), 1);
    }

    #[tokio::test]
    async fn remote_refine_failures_are_reported_not_fatal() {
        let svc = service(vec![invoice()]).with_remote_recognizer(Arc::new(AlwaysUnavailable));

        let artifact = svc
            .process(&page_png(), ProcessingMode::RemoteRefine, false)
            .await
            .unwrap();

        assert_eq!(artifact.region_count, 0);
        assert_eq!(artifact.transcript, "");
        assert_eq!(artifact.failures.len(), 1);
        assert_eq!(artifact.failures[0].detection_index, 0);
        assert_eq!(&artifact.binary_data[0..4], b"%PDF");
    }

    #[test]
    fn http_remote_needs_base_url() {
        let err = service(vec![]).with_http_remote().err().unwrap();
        assert!(matches!(err, OcrError::RemoteNotConfigured));
    }
}
