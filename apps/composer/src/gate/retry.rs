//! Bounded generate-and-validate loop, modeled as an explicit state machine.
//!
//! ```text
//! Generating{n} --image--> Validating{n} --clean--> Accepted
//!      ^                        |
//!      |                   text | (n < max)
//!      +------ backoff ---------+
//!                               | (n == max)
//!                               v
//!                        ExhaustedRetries
//! ```
//! Each state carries its own timeout: generation is bounded by
//! `generation_timeout`, detection by `detection_timeout` (inside
//! `BackgroundGate::validate`). Attempts run strictly one after another.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::DynamicImage;
use serde::Serialize;
use tracing::{info, warn};

use super::{BackgroundGate, TextCheck};
use crate::config::EngineConfig;
use crate::errors::AssetError;

/// Produces candidate backgrounds. `previous` is the failed verdict of the
/// prior attempt, so implementations can tighten their prompt.
#[async_trait]
pub trait BackgroundGenerator: Send + Sync {
    async fn generate(
        &self,
        attempt: u32,
        previous: Option<&TextCheck>,
    ) -> Result<DynamicImage, AssetError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Base delay before attempt 2; doubles for each later attempt.
    pub retry_backoff: Duration,
    pub generation_timeout: Duration,
    pub detection_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            retry_backoff: config.retry_backoff,
            generation_timeout: config.generation_timeout,
            detection_timeout: config.detection_timeout,
        }
    }

    /// Delay before `attempt` (1-based). Zero for the first attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(16);
        self.retry_backoff.saturating_mul(1 << exponent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    TextDetected,
    GenerationFailed,
}

/// One row of the attempt history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub detected_text: String,
    pub confidence: f32,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub passed: bool,
    /// Accepted image, or the last generated one on exhaustion.
    pub image: Option<DynamicImage>,
    pub attempts: Vec<AttemptRecord>,
}

impl RetryOutcome {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

enum GateState {
    Generating {
        attempt: u32,
        previous: Option<TextCheck>,
    },
    Validating {
        attempt: u32,
        image: DynamicImage,
        started: Instant,
    },
    Accepted {
        image: DynamicImage,
    },
    ExhaustedRetries,
}

pub(super) async fn run(
    gate: &BackgroundGate,
    generator: &dyn BackgroundGenerator,
    max_attempts: u32,
) -> RetryOutcome {
    let max_attempts = max_attempts.max(1);
    let generation_timeout = gate.policy().generation_timeout;
    let mut history: Vec<AttemptRecord> = Vec::with_capacity(max_attempts as usize);
    let mut last_image: Option<DynamicImage> = None;

    let mut state = GateState::Generating {
        attempt: 1,
        previous: None,
    };

    loop {
        state = match state {
            GateState::Generating { attempt, previous } => {
                let delay = gate.backoff_for(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                let started = Instant::now();
                let generated = tokio::time::timeout(
                    generation_timeout,
                    generator.generate(attempt, previous.as_ref()),
                )
                .await
                .unwrap_or_else(|_| {
                    Err(AssetError::Generation(format!(
                        "timed out after {}s",
                        generation_timeout.as_secs()
                    )))
                });

                match generated {
                    Ok(image) => GateState::Validating {
                        attempt,
                        image,
                        started,
                    },
                    Err(e) => {
                        warn!(attempt, error = %e, "background generation failed");
                        history.push(AttemptRecord {
                            attempt,
                            outcome: AttemptOutcome::GenerationFailed,
                            detected_text: String::new(),
                            confidence: 0.0,
                            error: Some(e.to_string()),
                            elapsed_ms: started.elapsed().as_millis() as u64,
                        });
                        next_or_exhausted(attempt, max_attempts, previous)
                    }
                }
            }

            GateState::Validating {
                attempt,
                image,
                started,
            } => {
                let check = gate.validate(&image).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let outcome = if check.passed {
                    AttemptOutcome::Accepted
                } else {
                    AttemptOutcome::TextDetected
                };
                history.push(AttemptRecord {
                    attempt,
                    outcome,
                    detected_text: check.detected_text.clone(),
                    confidence: check.confidence,
                    error: check.tool_error.clone(),
                    elapsed_ms,
                });

                if check.passed {
                    GateState::Accepted { image }
                } else {
                    last_image = Some(image);
                    next_or_exhausted(attempt, max_attempts, Some(check))
                }
            }

            GateState::Accepted { image } => {
                info!(attempts = history.len(), "background accepted");
                return RetryOutcome {
                    passed: true,
                    image: Some(image),
                    attempts: history,
                };
            }

            GateState::ExhaustedRetries => {
                warn!(
                    attempts = history.len(),
                    "background gate exhausted retries without a clean image"
                );
                return RetryOutcome {
                    passed: false,
                    image: last_image,
                    attempts: history,
                };
            }
        };
    }
}

fn next_or_exhausted(attempt: u32, max_attempts: u32, previous: Option<TextCheck>) -> GateState {
    if attempt >= max_attempts {
        GateState::ExhaustedRetries
    } else {
        GateState::Generating {
            attempt: attempt + 1,
            previous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{DetectedToken, DetectorError, TextDetector};
    use image::RgbaImage;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Flags every image whose top-left red channel is below `clean_from`.
    struct MarkerDetector {
        clean_from: u8,
    }

    #[async_trait]
    impl TextDetector for MarkerDetector {
        async fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectedToken>, DetectorError> {
            let marker = image.to_rgba8().get_pixel(0, 0)[0];
            if marker >= self.clean_from {
                Ok(vec![])
            } else {
                Ok(vec![DetectedToken {
                    text: "SALE".to_string(),
                    confidence: 90.0,
                }])
            }
        }
    }

    /// Generates images whose marker pixel is the attempt number.
    struct CountingGenerator {
        calls: AtomicU32,
        seen_previous: Mutex<Vec<Option<String>>>,
        fail_on: Option<u32>,
    }

    impl CountingGenerator {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                seen_previous: Mutex::new(vec![]),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl BackgroundGenerator for CountingGenerator {
        async fn generate(
            &self,
            attempt: u32,
            previous: Option<&TextCheck>,
        ) -> Result<DynamicImage, AssetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_previous
                .lock()
                .unwrap()
                .push(previous.map(|c| c.detected_text.clone()));
            if self.fail_on == Some(attempt) {
                return Err(AssetError::Generation("model overloaded".to_string()));
            }
            let img = RgbaImage::from_pixel(8, 8, image::Rgba([attempt as u8, 0, 0, 255]));
            Ok(DynamicImage::ImageRgba8(img))
        }
    }

    fn gate(clean_from: u8) -> BackgroundGate {
        BackgroundGate::new(
            Arc::new(MarkerDetector { clean_from }),
            RetryPolicy::default(),
        )
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            retry_backoff: Duration::from_millis(500),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_for(1), Duration::ZERO);
        assert_eq!(policy.backoff_for(2), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_clean_image_is_accepted_without_retry() {
        let generator = CountingGenerator::new();
        let outcome = gate(1).validate_with_retry(&generator, 3).await;
        assert!(outcome.passed);
        assert_eq!(outcome.attempt_count(), 1);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::Accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_clean_and_passes_previous_verdict() {
        let generator = CountingGenerator::new();
        let outcome = gate(2).validate_with_retry(&generator, 3).await;
        assert!(outcome.passed);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::TextDetected);
        assert_eq!(outcome.attempts[0].detected_text, "SALE");
        let previous = generator.seen_previous.lock().unwrap().clone();
        assert_eq!(previous, vec![None, Some("SALE".to_string())]);
        let marker = outcome.image.unwrap().to_rgba8().get_pixel(0, 0)[0];
        assert_eq!(marker, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_makes_exactly_max_generation_calls() {
        let generator = CountingGenerator::new();
        let outcome = gate(u8::MAX).validate_with_retry(&generator, 3).await;
        assert!(!outcome.passed);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.attempt_count(), 3);
        assert!(outcome
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::TextDetected));
        // Last generated image is still returned.
        let marker = outcome.image.unwrap().to_rgba8().get_pixel(0, 0)[0];
        assert_eq!(marker, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_failure_consumes_an_attempt() {
        let mut generator = CountingGenerator::new();
        generator.fail_on = Some(1);
        let outcome = gate(1).validate_with_retry(&generator, 3).await;
        assert!(outcome.passed);
        assert_eq!(outcome.attempt_count(), 2);
        assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::GenerationFailed);
        assert!(outcome.attempts[0].error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_attempts_still_tries_once() {
        let generator = CountingGenerator::new();
        let outcome = gate(u8::MAX).validate_with_retry(&generator, 0).await;
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert!(!outcome.passed);
    }
}
