//! Remote refinement: re-crop every region from the page, transcribe each
//! crop remotely, and collect the results as they arrive.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use image::RgbImage;
use tokio::sync::{Mutex, Semaphore};

use super::markup::rich_text_to_line;
use super::preprocess::{crop_region, encode_jpeg};
use super::remote::{RemoteError, RemoteRecognizer};
use super::types::{CropRequest, DrawableRegion, RegionFailure, TranscriptOrder};
use crate::config::RemoteConfig;

/// Regions that received a transcription, plus the ones that did not.
#[derive(Debug, Default)]
pub struct RefineOutcome {
    pub regions: Vec<DrawableRegion>,
    pub failures: Vec<RegionFailure>,
}

pub struct RemoteRefiner {
    recognizer: Arc<dyn RemoteRecognizer>,
    config: RemoteConfig,
    limiter: Arc<Semaphore>,
}

impl RemoteRefiner {
    pub fn new(recognizer: Arc<dyn RemoteRecognizer>, config: RemoteConfig) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        Self {
            recognizer,
            config,
            limiter,
        }
    }

    /// Submit every region and wait until all submissions have settled.
    ///
    /// With [`TranscriptOrder::Arrival`] the returned regions are in response
    /// arrival order; with [`TranscriptOrder::Detection`] they are sorted by
    /// detection index.
    pub async fn refine(
        &self,
        image: &RgbImage,
        regions: Vec<DrawableRegion>,
        order: TranscriptOrder,
    ) -> RefineOutcome {
        let start = Instant::now();
        let (crops, skipped) = prepare_crops(image, regions);
        let submitted = crops.len();

        let settled: Mutex<Vec<Result<DrawableRegion, RegionFailure>>> =
            Mutex::new(skipped.into_iter().map(Err).collect());

        join_all(crops.into_iter().map(|crop| {
            let settled = &settled;
            async move {
                let outcome = self.submit(crop).await;
                settled.lock().await.push(outcome);
            }
        }))
        .await;

        let mut outcome = RefineOutcome::default();
        for result in settled.into_inner() {
            match result {
                Ok(region) => outcome.regions.push(region),
                Err(failure) => {
                    tracing::warn!(
                        detection_index = failure.detection_index,
                        error = %failure.error,
                        "Region dropped from remote refinement"
                    );
                    outcome.failures.push(failure);
                }
            }
        }

        if order == TranscriptOrder::Detection {
            outcome.regions.sort_by_key(|r| r.detection_index);
        }

        tracing::info!(
            submitted,
            refined = outcome.regions.len(),
            failed = outcome.failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Remote refinement complete"
        );

        outcome
    }

    async fn submit(&self, crop: CropRequest) -> Result<DrawableRegion, RegionFailure> {
        let index = crop.region.detection_index;
        let fail = |error| RegionFailure {
            detection_index: index,
            error,
        };

        let CropRequest {
            cropped_image,
            region,
        } = crop;

        let jpeg = encode_crop(cropped_image, self.config.jpeg_quality)
            .await
            .map_err(fail)?;

        let raw = self.recognize_with_retry(jpeg, index).await.map_err(fail)?;
        let text = rich_text_to_line(&raw).map_err(fail)?;

        Ok(region.with_text(text))
    }

    async fn recognize_with_retry(&self, jpeg: Vec<u8>, index: usize) -> Result<String, RemoteError> {
        let mut attempt: u32 = 0;
        loop {
            let result = self.recognize_once(jpeg.clone()).await;
            match result {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = backoff_delay(self.config.retry_backoff_ms, attempt);
                    tracing::debug!(
                        detection_index = index,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying remote recognition"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn recognize_once(&self, jpeg: Vec<u8>) -> Result<String, RemoteError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| RemoteError::Network("request limiter closed".into()))?;

        let secs = self.config.request_timeout_secs;
        if secs == 0 {
            return self.recognizer.recognize(jpeg).await;
        }
        tokio::time::timeout(Duration::from_secs(secs), self.recognizer.recognize(jpeg))
            .await
            .map_err(|_| RemoteError::Timeout { secs })?
    }
}

/// Cut each region out of `image`. Regions whose clamped rectangle is empty
/// cannot be submitted; they come back as [`RemoteError::EmptyCrop`] failures.
pub fn prepare_crops(
    image: &RgbImage,
    regions: Vec<DrawableRegion>,
) -> (Vec<CropRequest>, Vec<RegionFailure>) {
    let mut crops = Vec::with_capacity(regions.len());
    let mut skipped = Vec::new();
    for region in regions {
        match crop_region(image, &region.pixel_rect) {
            Some(cropped_image) => crops.push(CropRequest {
                cropped_image,
                region,
            }),
            None => skipped.push(RegionFailure {
                detection_index: region.detection_index,
                error: RemoteError::EmptyCrop,
            }),
        }
    }
    (crops, skipped)
}

/// JPEG-encode a crop on the blocking pool.
async fn encode_crop(crop: RgbImage, quality: u8) -> Result<Vec<u8>, RemoteError> {
    tokio::task::spawn_blocking(move || encode_jpeg(&crop, quality))
        .await
        .map_err(|e| RemoteError::Encode(e.to_string()))?
        .map_err(|e| RemoteError::Encode(e.to_string()))
}

fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(1u64 << attempt.min(16)))
}
