//! Composition Engine: orchestrates one composition request.
//!
//! Flow: validate plan → resolve background (gate) → select template →
//!       render slots → validate compliance (blocking pool) → result.
//!
//! The engine is immutable after construction and safe to share across
//! concurrent requests; every per-request structure lives on the stack of
//! `compose`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::{DynamicImage, RgbaImage};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assets::{AssetFetcher, HttpAssetFetcher};
use crate::config::EngineConfig;
use crate::errors::{AssetError, ComposeError};
use crate::gate::{
    AttemptOutcome, AttemptRecord, BackgroundGate, BackgroundGenerator, DisabledDetector,
    OcrClient, RetryPolicy, TextDetector,
};
use crate::layout::{select_template, ContentDensity, SelectionTier, TemplateCatalog};
use crate::logo::LogoPlacement;
use crate::models::{BrandTokens, ComplianceReport, DesignPlan};
use crate::render::{GridCompositor, RenderedElement, SkippedElement};
use crate::validator::{BrandValidator, ComplianceValidator, RenderedCopy};

/// Where the background comes from for one request.
pub enum BackgroundSource<'a> {
    /// Palette gradient.
    None,
    /// Already-decoded raster supplied by the caller.
    Image(DynamicImage),
    /// Remote or `data:` URL. Fetch failure is fatal.
    Url(String),
    /// Generated through the text-rejecting gate.
    Generated(&'a dyn BackgroundGenerator),
}

// ────────────────────────────────────────────────────────────────────────────
// Result
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CompositionResult {
    pub request_id: Uuid,
    pub composed_at: DateTime<Utc>,
    pub image: RgbaImage,
    pub report: ComplianceReport,
    pub template_id: String,
    pub selection_tier: SelectionTier,
    pub density: ContentDensity,
    pub logo: Option<LogoPlacement>,
    pub elements: Vec<RenderedElement>,
    pub skipped: Vec<SkippedElement>,
    /// Per-attempt history when the background was generated.
    pub gate_attempts: Vec<AttemptRecord>,
    /// True when the palette gradient was drawn instead of a raster.
    pub used_gradient: bool,
    /// True when a generated background was rejected and replaced by the gradient.
    pub gate_fallback: bool,
}

/// Everything in a result except the pixels, for logging and persistence.
#[derive(Debug, Serialize)]
pub struct CompositionAudit<'a> {
    pub request_id: Uuid,
    pub composed_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub report: &'a ComplianceReport,
    pub template_id: &'a str,
    pub selection_tier: SelectionTier,
    pub density: &'a ContentDensity,
    pub logo: Option<&'a LogoPlacement>,
    pub elements: &'a [RenderedElement],
    pub skipped: &'a [SkippedElement],
    pub gate_attempts: &'a [AttemptRecord],
    pub used_gradient: bool,
    pub gate_fallback: bool,
}

impl CompositionResult {
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, ComposeError> {
        let mut buf = std::io::Cursor::new(Vec::new());
        self.image
            .write_to(&mut buf, image::ImageFormat::Png)
            .map_err(|e| ComposeError::Internal(anyhow::Error::new(e).context("PNG encoding failed")))?;
        Ok(buf.into_inner())
    }

    pub fn to_png_base64(&self) -> Result<String, ComposeError> {
        use base64::Engine;
        Ok(base64::engine::general_purpose::STANDARD.encode(self.to_png_bytes()?))
    }

    pub fn audit(&self) -> CompositionAudit<'_> {
        CompositionAudit {
            request_id: self.request_id,
            composed_at: self.composed_at,
            width: self.image.width(),
            height: self.image.height(),
            report: &self.report,
            template_id: &self.template_id,
            selection_tier: self.selection_tier,
            density: &self.density,
            logo: self.logo.as_ref(),
            elements: &self.elements,
            skipped: &self.skipped,
            gate_attempts: &self.gate_attempts,
            used_gradient: self.used_gradient,
            gate_fallback: self.gate_fallback,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

pub struct CompositionEngine {
    tokens: Arc<BrandTokens>,
    catalog: Arc<TemplateCatalog>,
    gate: BackgroundGate,
    fetcher: Arc<dyn AssetFetcher>,
    validator: Arc<dyn BrandValidator>,
    config: EngineConfig,
}

pub struct EngineBuilder {
    tokens: Arc<BrandTokens>,
    config: EngineConfig,
    catalog: Option<Arc<TemplateCatalog>>,
    detector: Option<Arc<dyn TextDetector>>,
    fetcher: Option<Arc<dyn AssetFetcher>>,
    validator: Option<Arc<dyn BrandValidator>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(mut self, catalog: TemplateCatalog) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    pub fn detector(mut self, detector: Arc<dyn TextDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn BrandValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Fills unset services from the config: OCR client when
    /// `ocr_url` is set (else detection is disabled and fails open),
    /// HTTP fetcher, default validator.
    pub fn build(self) -> CompositionEngine {
        let config = self.config;
        let detector: Arc<dyn TextDetector> = match (self.detector, &config.ocr_url) {
            (Some(detector), _) => detector,
            (None, Some(url)) => Arc::new(OcrClient::new(
                url.clone(),
                config.ocr_api_key.clone(),
                config.detection_timeout,
            )),
            (None, None) => Arc::new(DisabledDetector),
        };
        let fetcher: Arc<dyn AssetFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpAssetFetcher::from_config(&config)),
        };
        let validator: Arc<dyn BrandValidator> = match self.validator {
            Some(validator) => validator,
            None => Arc::new(ComplianceValidator::from_config(&config)),
        };

        CompositionEngine {
            tokens: self.tokens,
            catalog: self.catalog.unwrap_or_else(|| Arc::new(TemplateCatalog::builtin())),
            gate: BackgroundGate::new(detector, RetryPolicy::from_config(&config)),
            fetcher,
            validator,
            config,
        }
    }
}

struct ResolvedBackground {
    image: Option<DynamicImage>,
    attempts: Vec<AttemptRecord>,
    gate_fallback: bool,
}

impl CompositionEngine {
    pub fn builder(tokens: BrandTokens) -> EngineBuilder {
        EngineBuilder {
            tokens: Arc::new(tokens),
            config: EngineConfig::default(),
            catalog: None,
            detector: None,
            fetcher: None,
            validator: None,
        }
    }

    /// Engine with every service derived from `config`.
    pub fn from_config(tokens: BrandTokens, config: EngineConfig) -> Self {
        Self::builder(tokens).config(config).build()
    }

    pub fn tokens(&self) -> &BrandTokens {
        &self.tokens
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gate(&self) -> &BackgroundGate {
        &self.gate
    }

    /// Composes one graphic. A low compliance score is a normal result;
    /// only an invalid plan, a failed required background or an internal
    /// fault is an error.
    pub async fn compose(
        &self,
        plan: &DesignPlan,
        background: BackgroundSource<'_>,
    ) -> Result<CompositionResult, ComposeError> {
        let request_id = Uuid::new_v4();
        plan.validate(&self.tokens).map_err(ComposeError::InvalidPlan)?;

        let resolved = self.resolve_background(background).await?;
        let selection = select_template(plan, &self.catalog);
        info!(
            %request_id,
            template = %selection.template.id,
            score = selection.score,
            density = selection.density.class.as_str(),
            "template selected"
        );

        let compositor = GridCompositor::new(self.fetcher.clone());
        let output = compositor
            .render(plan, &self.tokens, &selection.template, resolved.image.as_ref())
            .await;

        let mut texts: Vec<(String, String)> = output
            .texts
            .iter()
            .map(|t| (t.field.to_string(), t.text.clone()))
            .collect();
        texts.extend(output.cta.iter().map(|t| (t.field.to_string(), t.text.clone())));
        let copy = RenderedCopy {
            texts,
            text_color: output.text_color,
            text_regions: output.texts.iter().map(|t| t.region).collect(),
            ink_mask: Some(output.ink),
            logo_safe_zone: output.logo.as_ref().map(|l| l.safe_zone_respected),
        };

        let validator = self.validator.clone();
        let tokens = self.tokens.clone();
        let canvas = output.canvas;
        let (canvas, report) = tokio::task::spawn_blocking(move || {
            let report = validator.validate(&canvas, &copy, &tokens);
            (canvas, report)
        })
        .await
        .map_err(|e| ComposeError::Internal(anyhow::anyhow!("validation task failed: {e}")))?;

        info!(
            %request_id,
            score = report.overall_score,
            passed = report.passed,
            skipped = output.skipped.len(),
            "composition complete"
        );

        Ok(CompositionResult {
            request_id,
            composed_at: Utc::now(),
            image: canvas,
            report,
            template_id: selection.template.id,
            selection_tier: selection.tier,
            density: selection.density,
            logo: output.logo,
            elements: output.elements,
            skipped: output.skipped,
            gate_attempts: resolved.attempts,
            used_gradient: output.used_gradient,
            gate_fallback: resolved.gate_fallback,
        })
    }

    async fn resolve_background(
        &self,
        source: BackgroundSource<'_>,
    ) -> Result<ResolvedBackground, ComposeError> {
        let plain = |image: Option<DynamicImage>| ResolvedBackground {
            image,
            attempts: Vec::new(),
            gate_fallback: false,
        };

        match source {
            BackgroundSource::None => Ok(plain(None)),
            BackgroundSource::Image(image) => Ok(plain(Some(image))),
            BackgroundSource::Url(url) => {
                let image = self
                    .fetcher
                    .fetch_image(&url)
                    .await
                    .map_err(ComposeError::RequiredAsset)?;
                Ok(plain(Some(image)))
            }
            BackgroundSource::Generated(generator) => {
                let outcome = self
                    .gate
                    .validate_with_retry(generator, self.config.max_attempts)
                    .await;
                if outcome.passed {
                    return Ok(ResolvedBackground {
                        image: outcome.image,
                        attempts: outcome.attempts,
                        gate_fallback: false,
                    });
                }

                let all_failed = outcome
                    .attempts
                    .iter()
                    .all(|a| a.outcome == AttemptOutcome::GenerationFailed);
                if all_failed {
                    let last = outcome
                        .attempts
                        .last()
                        .and_then(|a| a.error.clone())
                        .unwrap_or_else(|| "no attempts made".to_string());
                    return Err(ComposeError::RequiredAsset(AssetError::Generation(last)));
                }

                warn!(
                    attempts = outcome.attempts.len(),
                    "every generated background contained text, composing on palette gradient"
                );
                Ok(ResolvedBackground {
                    image: None,
                    attempts: outcome.attempts,
                    gate_fallback: true,
                })
            }
        }
    }
}
