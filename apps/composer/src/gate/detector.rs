//! Text detection backends for the background gate.
//!
//! The gate only depends on the `TextDetector` trait. `OcrClient` talks to a
//! remote OCR service; `DisabledDetector` is used when none is configured and
//! always reports itself unavailable, which the gate treats as "no text".

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use image::DynamicImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OCR API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("could not encode image for detection: {0}")]
    Encode(#[from] image::ImageError),

    #[error("text detection unavailable: {0}")]
    Unavailable(String),

    #[error("text detection timed out after {0:?}")]
    Timeout(Duration),
}

/// A word or line recognised in an image. `confidence` is 0–100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedToken {
    pub text: String,
    pub confidence: f32,
}

#[async_trait]
pub trait TextDetector: Send + Sync {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectedToken>, DetectorError>;
}

/// Placeholder used when no OCR endpoint is configured.
pub struct DisabledDetector;

#[async_trait]
impl TextDetector for DisabledDetector {
    async fn detect(&self, _image: &DynamicImage) -> Result<Vec<DetectedToken>, DetectorError> {
        Err(DetectorError::Unavailable(
            "no OCR endpoint configured".to_string(),
        ))
    }
}

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    image_base64: &'a str,
    mime_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    tokens: Vec<DetectedToken>,
}

/// Remote OCR service client with retry on 429/5xx.
#[derive(Clone)]
pub struct OcrClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OcrClient {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            endpoint,
            api_key,
        }
    }

    async fn call(&self, body: &OcrRequest<'_>) -> Result<OcrResponse, DetectorError> {
        let mut last_error: Option<DetectorError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 250ms, 500ms
                let delay = Duration::from_millis(250 * (1 << (attempt - 1)));
                warn!(
                    "OCR call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&self.endpoint).json(body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(DetectorError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let message = response.text().await.unwrap_or_default();
                warn!("OCR API returned {}: {}", status, message);
                last_error = Some(DetectorError::Api {
                    status: status.as_u16(),
                    message,
                });
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(DetectorError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: OcrResponse = response.json().await?;
            debug!(tokens = parsed.tokens.len(), "OCR call succeeded");
            return Ok(parsed);
        }

        Err(last_error.unwrap_or_else(|| {
            DetectorError::Unavailable(format!("gave up after {MAX_RETRIES} attempts"))
        }))
    }
}

#[async_trait]
impl TextDetector for OcrClient {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectedToken>, DetectorError> {
        let mut buf = std::io::Cursor::new(Vec::new());
        image.write_to(&mut buf, image::ImageFormat::Png)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(buf.into_inner());

        let response = self
            .call(&OcrRequest {
                image_base64: &encoded,
                mime_type: "image/png",
            })
            .await?;
        Ok(response.tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_ocr_response_parses_tokens() {
        let parsed: OcrResponse = serde_json::from_str(
            r#"{"tokens": [{"text": "SALE", "confidence": 91.5}, {"text": "x", "confidence": 20}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.tokens.len(), 2);
        assert_eq!(parsed.tokens[0].text, "SALE");
    }

    #[test]
    fn test_ocr_response_missing_tokens_is_empty() {
        let parsed: OcrResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.tokens.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_detector_reports_unavailable() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(2, 2));
        let err = DisabledDetector.detect(&img).await.unwrap_err();
        assert!(matches!(err, DetectorError::Unavailable(_)));
    }
}
