use std::time::Duration;

use anyhow::{Context, Result};

const MIN_FETCH_TIMEOUT_SECS: u64 = 10;
const MAX_FETCH_TIMEOUT_SECS: u64 = 30;

/// Engine configuration loaded from environment variables.
/// Every field has a default; only malformed values are errors.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Overall compliance score needed to pass (0–100).
    pub pass_threshold: f64,
    /// Background generate-and-validate attempts.
    pub max_attempts: u32,
    /// Per-request timeout for remote asset fetches (clamped to 10..=30s).
    pub fetch_timeout: Duration,
    /// Extra fetch attempts after the first (0 or 1).
    pub fetch_retries: u32,
    /// Base delay between gate attempts; doubles per attempt.
    pub retry_backoff: Duration,
    pub generation_timeout: Duration,
    pub detection_timeout: Duration,
    /// Per-channel buckets for dominant-color extraction.
    pub quantization_levels: u32,
    /// Text-detection endpoint; detection fails open when unset.
    pub ocr_url: Option<String>,
    pub ocr_api_key: Option<String>,
    pub rust_log: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 70.0,
            max_attempts: 3,
            fetch_timeout: Duration::from_secs(15),
            fetch_retries: 1,
            retry_backoff: Duration::from_millis(500),
            generation_timeout: Duration::from_secs(60),
            detection_timeout: Duration::from_secs(20),
            quantization_levels: 32,
            ocr_url: None,
            ocr_api_key: None,
            rust_log: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. `from_env` uses the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let pass_threshold: f64 = parse_or(&lookup, "COMPOSER_PASS_THRESHOLD", defaults.pass_threshold)?;
        if !(0.0..=100.0).contains(&pass_threshold) {
            anyhow::bail!("COMPOSER_PASS_THRESHOLD must be within 0..=100, got {pass_threshold}");
        }

        let fetch_timeout_secs: u64 = parse_or(
            &lookup,
            "COMPOSER_FETCH_TIMEOUT_SECS",
            defaults.fetch_timeout.as_secs(),
        )?;

        Ok(EngineConfig {
            pass_threshold,
            max_attempts: parse_or(&lookup, "COMPOSER_MAX_ATTEMPTS", defaults.max_attempts)?.max(1),
            fetch_timeout: Duration::from_secs(
                fetch_timeout_secs.clamp(MIN_FETCH_TIMEOUT_SECS, MAX_FETCH_TIMEOUT_SECS),
            ),
            fetch_retries: parse_or(&lookup, "COMPOSER_FETCH_RETRIES", defaults.fetch_retries)?.min(1),
            retry_backoff: Duration::from_millis(parse_or(
                &lookup,
                "COMPOSER_RETRY_BACKOFF_MS",
                defaults.retry_backoff.as_millis() as u64,
            )?),
            generation_timeout: Duration::from_secs(parse_or(
                &lookup,
                "COMPOSER_GENERATION_TIMEOUT_SECS",
                defaults.generation_timeout.as_secs(),
            )?),
            detection_timeout: Duration::from_secs(parse_or(
                &lookup,
                "COMPOSER_DETECTION_TIMEOUT_SECS",
                defaults.detection_timeout.as_secs(),
            )?),
            quantization_levels: parse_or(
                &lookup,
                "COMPOSER_QUANTIZATION_LEVELS",
                defaults.quantization_levels,
            )?
            .clamp(2, 256),
            ocr_url: lookup("COMPOSER_OCR_URL").filter(|v| !v.trim().is_empty()),
            ocr_api_key: lookup("COMPOSER_OCR_API_KEY").filter(|v| !v.trim().is_empty()),
            rust_log: lookup("RUST_LOG").unwrap_or(defaults.rust_log),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_empty_env_gives_defaults() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("COMPOSER_PASS_THRESHOLD", "80"),
            ("COMPOSER_MAX_ATTEMPTS", "5"),
            ("COMPOSER_OCR_URL", "http://ocr.local/detect"),
        ]))
        .unwrap();
        assert_eq!(config.pass_threshold, 80.0);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.ocr_url.as_deref(), Some("http://ocr.local/detect"));
    }

    #[test]
    fn test_fetch_timeout_and_retries_are_clamped() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("COMPOSER_FETCH_TIMEOUT_SECS", "120"),
            ("COMPOSER_FETCH_RETRIES", "4"),
        ]))
        .unwrap();
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.fetch_retries, 1);

        let config =
            EngineConfig::from_lookup(lookup_from(&[("COMPOSER_FETCH_TIMEOUT_SECS", "1")])).unwrap();
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_malformed_number_is_error_naming_the_key() {
        let err = EngineConfig::from_lookup(lookup_from(&[("COMPOSER_MAX_ATTEMPTS", "three")]))
            .unwrap_err();
        assert!(err.to_string().contains("COMPOSER_MAX_ATTEMPTS"), "{err}");
    }

    #[test]
    fn test_threshold_out_of_range_is_error() {
        assert!(EngineConfig::from_lookup(lookup_from(&[("COMPOSER_PASS_THRESHOLD", "140")])).is_err());
    }

    #[test]
    fn test_zero_attempts_becomes_one() {
        let config =
            EngineConfig::from_lookup(lookup_from(&[("COMPOSER_MAX_ATTEMPTS", "0")])).unwrap();
        assert_eq!(config.max_attempts, 1);
    }
}
