//! Remote asset fetching (background, logo variants, product shots).
//!
//! Every fetch carries a per-request timeout and at most one retry. `data:`
//! URLs are decoded locally without touching the network.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use image::DynamicImage;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::errors::AssetError;

/// Source of decoded images. Injected so tests can serve fixtures.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<DynamicImage, AssetError>;
}

/// `reqwest`-backed fetcher.
#[derive(Clone)]
pub struct HttpAssetFetcher {
    client: Client,
    timeout: Duration,
    retries: u32,
}

impl HttpAssetFetcher {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            client: Client::new(),
            timeout,
            retries: retries.min(1),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.fetch_timeout, config.fetch_retries)
    }

    async fn fetch_bytes_once(&self, url: &str) -> Result<Bytes, AssetError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| self.classify(url, e))
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> AssetError {
        if err.is_timeout() {
            AssetError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else {
            AssetError::Http {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch_image(&self, url: &str) -> Result<DynamicImage, AssetError> {
        if url.starts_with("data:") {
            return decode_data_url(url);
        }

        let mut last_error: Option<AssetError> = None;
        for attempt in 0..=self.retries {
            if attempt > 0 {
                warn!(url, attempt, "asset fetch failed, retrying once");
            }
            match self.fetch_bytes_once(url).await {
                Ok(bytes) => {
                    debug!(url, bytes = bytes.len(), "asset fetched");
                    return Ok(image::load_from_memory(&bytes)?);
                }
                // Client errors will not change on retry.
                Err(AssetError::Status { status, .. }) if (400..500).contains(&status) => {
                    return Err(AssetError::Status {
                        url: url.to_string(),
                        status,
                    });
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| AssetError::Missing(url.to_string())))
    }
}

/// Decodes `data:[<mime>];base64,<payload>` into an image.
pub fn decode_data_url(url: &str) -> Result<DynamicImage, AssetError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| AssetError::DataUrl("missing 'data:' prefix".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| AssetError::DataUrl("missing ',' separator".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(AssetError::DataUrl(
            "only base64-encoded data URLs are supported".to_string(),
        ));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| AssetError::DataUrl(e.to_string()))?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Encodes an image as a `data:image/png;base64,...` URL.
pub fn encode_png_data_url(image: &DynamicImage) -> Result<String, AssetError> {
    let mut buf = std::io::Cursor::new(Vec::new());
    image.write_to(&mut buf, image::ImageFormat::Png)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(buf.into_inner());
    Ok(format!("data:image/png;base64,{encoded}"))
}
