//! Background acceptance gate.
//!
//! Rejects generated backgrounds that contain legible text (the compositor owns
//! all copy) and drives the bounded regenerate-and-retry loop.
//!
//! # Failure semantics
//! - Detector errors and timeouts fail OPEN: the image is treated as clean and
//!   the failure is logged. A broken OCR tool must never block generation.
//! - Detected text always blocks, regardless of attempts remaining.

pub mod detector;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use detector::{DetectedToken, DetectorError, DisabledDetector, OcrClient, TextDetector};
pub use retry::{AttemptOutcome, AttemptRecord, BackgroundGenerator, RetryOutcome, RetryPolicy};

/// Images are downscaled to at most this many pixels on the long side before detection.
pub const MAX_DETECTION_DIMENSION: u32 = 1024;
/// Tokens below this confidence (0–100) are treated as noise.
pub const MIN_TOKEN_CONFIDENCE: f32 = 60.0;
/// Tokens shorter than this (in characters) are treated as noise.
pub const MIN_TOKEN_CHARS: usize = 3;

/// Verdict of a single text check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCheck {
    pub passed: bool,
    /// Surviving tokens joined with single spaces; empty when clean.
    pub detected_text: String,
    /// Highest surviving token confidence; 0 when clean.
    pub confidence: f32,
    /// Set when the detector failed and the check failed open.
    pub tool_error: Option<String>,
}

impl TextCheck {
    fn clean() -> Self {
        Self {
            passed: true,
            detected_text: String::new(),
            confidence: 0.0,
            tool_error: None,
        }
    }

    fn failed_open(reason: String) -> Self {
        Self {
            tool_error: Some(reason),
            ..Self::clean()
        }
    }
}

/// Keeps tokens that are confident and long enough to be real words.
pub fn filter_tokens(tokens: &[DetectedToken]) -> Vec<&DetectedToken> {
    tokens
        .iter()
        .filter(|t| t.confidence >= MIN_TOKEN_CONFIDENCE)
        .filter(|t| t.text.trim().chars().count() >= MIN_TOKEN_CHARS)
        .collect()
}

/// Builds the verdict from raw detector output.
pub fn evaluate_tokens(tokens: &[DetectedToken]) -> TextCheck {
    let survivors = filter_tokens(tokens);
    if survivors.is_empty() {
        return TextCheck::clean();
    }
    let detected_text = survivors
        .iter()
        .map(|t| t.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let confidence = survivors
        .iter()
        .map(|t| t.confidence)
        .fold(0.0_f32, f32::max);
    TextCheck {
        passed: false,
        detected_text,
        confidence,
        tool_error: None,
    }
}

/// Shrinks the image so its long side is at most `MAX_DETECTION_DIMENSION`.
pub fn downscale_for_detection(image: &DynamicImage) -> Option<DynamicImage> {
    let long_side = image.width().max(image.height());
    if long_side <= MAX_DETECTION_DIMENSION {
        return None;
    }
    Some(image.resize(
        MAX_DETECTION_DIMENSION,
        MAX_DETECTION_DIMENSION,
        FilterType::Triangle,
    ))
}

/// Text filter plus retry driver. Cheap to clone; shares the detector.
#[derive(Clone)]
pub struct BackgroundGate {
    detector: Arc<dyn TextDetector>,
    policy: RetryPolicy,
}

impl BackgroundGate {
    pub fn new(detector: Arc<dyn TextDetector>, policy: RetryPolicy) -> Self {
        Self { detector, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs text detection on one image.
    pub async fn validate(&self, image: &DynamicImage) -> TextCheck {
        let scaled = downscale_for_detection(image);
        let target = scaled.as_ref().unwrap_or(image);

        let detection = tokio::time::timeout(
            self.policy.detection_timeout,
            self.detector.detect(target),
        )
        .await
        .unwrap_or(Err(DetectorError::Timeout(self.policy.detection_timeout)));

        match detection {
            Ok(tokens) => {
                let check = evaluate_tokens(&tokens);
                if check.passed {
                    info!(raw_tokens = tokens.len(), "background gate: no text detected");
                } else {
                    info!(
                        detected = %check.detected_text,
                        confidence = check.confidence,
                        "background gate: text detected"
                    );
                }
                check
            }
            Err(e) => {
                warn!(error = %e, "background gate: text detection failed, treating image as clean");
                TextCheck::failed_open(e.to_string())
            }
        }
    }

    /// Generate-then-validate until a clean image or `max_attempts` is reached.
    pub async fn validate_with_retry(
        &self,
        generator: &dyn BackgroundGenerator,
        max_attempts: u32,
    ) -> RetryOutcome {
        retry::run(self, generator, max_attempts).await
    }

    pub(crate) fn backoff_for(&self, attempt: u32) -> Duration {
        self.policy.backoff_for(attempt)
    }
}
