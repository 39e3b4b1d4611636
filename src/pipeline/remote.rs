//! Remote text recognizer seam and its HTTP implementation.
//!
//! The remote service receives one JPEG crop per request and answers with a
//! JSON object whose `text` field holds rich text (HTML). Flattening that
//! markup is left to the caller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::OcrError;
use crate::config::RemoteConfig;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Remote recognizer unreachable: {0}")]
    Network(String),

    #[error("Remote recognizer returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Remote response is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("Remote response markup could not be parsed: {0}")]
    MalformedMarkup(String),

    #[error("Remote request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Failed to encode crop: {0}")]
    Encode(String),

    #[error("Region lies outside the image")]
    EmptyCrop,
}

impl RemoteError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::MalformedJson(_)
            | Self::MalformedMarkup(_)
            | Self::Encode(_)
            | Self::EmptyCrop => false,
        }
    }
}

/// Transcribes a single JPEG-encoded crop.
#[async_trait]
pub trait RemoteRecognizer: Send + Sync {
    /// Returns the raw rich-text payload for `jpeg`.
    async fn recognize(&self, jpeg: Vec<u8>) -> Result<String, RemoteError>;
}

// ═══════════════════════════════════════════════════════════
// HTTP recognizer
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct VisionResponse {
    text: String,
}

/// Multipart upload client. One instance holds one connection pool; share it
/// across all regions of a page (and across pages).
pub struct HttpRemoteRecognizer {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    timeout_secs: u64,
}

impl HttpRemoteRecognizer {
    /// `timeout_secs == 0` disables the per-request timeout.
    pub fn new(base_url: &str, path: &str, token: &str, timeout_secs: u64) -> Result<Self, OcrError> {
        let mut builder = reqwest::Client::builder();
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| OcrError::Config(format!("Failed to create HTTP client: {e}")))?;

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), path),
            token: token.to_string(),
            timeout_secs,
        })
    }

    /// Build from config. `base_url` must be set.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, OcrError> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(OcrError::RemoteNotConfigured)?;
        Self::new(base_url, &config.path, &config.token, config.request_timeout_secs)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_send_error(&self, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            RemoteError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl RemoteRecognizer for HttpRemoteRecognizer {
    async fn recognize(&self, jpeg: Vec<u8>) -> Result<String, RemoteError> {
        let part = reqwest::multipart::Part::bytes(jpeg)
            .file_name("page")
            .mime_str("image/jpeg")
            .map_err(|e| RemoteError::Encode(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("token", self.token.as_str())])
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        let parsed: VisionResponse = serde_json::from_slice(&bytes)
            .map_err(|e| RemoteError::MalformedJson(e.to_string()))?;

        Ok(parsed.text)
    }
}

// ═══════════════════════════════════════════════════════════
// Mock recognizer
// ═══════════════════════════════════════════════════════════

/// Answers every request with the same payload and counts calls.
pub struct MockRemoteRecognizer {
    payload: String,
    calls: AtomicUsize,
}

impl MockRemoteRecognizer {
    pub fn new(payload: &str) -> Self {
        Self {
            payload: payload.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteRecognizer for MockRemoteRecognizer {
    async fn recognize(&self, _jpeg: Vec<u8>) -> Result<String, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}
