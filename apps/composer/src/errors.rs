use thiserror::Error;

use crate::models::{PlanViolation, TokenError};

/// Fatal composition errors, returned to the orchestration layer.
///
/// A low compliance score is NOT an error; it comes back as a normal
/// `ComplianceReport` with `passed = false`.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("design plan rejected: {}", join_violations(.0))]
    InvalidPlan(Vec<PlanViolation>),

    #[error("brand tokens invalid: {0}")]
    Tokens(#[from] TokenError),

    /// The background could not be fetched, decoded or generated.
    #[error("required background unavailable: {0}")]
    RequiredAsset(#[source] AssetError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn join_violations(violations: &[PlanViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Remote or inline asset failure. Whether it is fatal depends on the asset:
/// optional elements are skipped, the background is required.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("fetching {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("malformed data URL: {0}")]
    DataUrl(String),

    #[error("background generation failed: {0}")]
    Generation(String),

    #[error("no source configured for {0}")]
    Missing(String),
}
