//! Color & Contrast Validator.
//!
//! A pure function of (final pixels, rendered copy, brand tokens). Each
//! sub-analysis that cannot run reports itself unavailable with full credit
//! rather than failing the whole report.

pub mod color_fidelity;
pub mod contrast_check;
pub mod policy;

use image::{GrayImage, RgbaImage};
use tracing::info;

use crate::color::contrast::{WCAG_AA_LARGE, WCAG_AA_NORMAL};
use crate::color::Rgb;
use crate::config::EngineConfig;
use crate::models::{BrandTokens, ComplianceReport, PixelRect, SubScore};

/// Weights and cut-offs for the overall score.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceThresholds {
    pub color_weight: f64,
    pub contrast_weight: f64,
    pub policy_weight: f64,
    pub pass_threshold: f64,
    /// Used when the brand does not set its own minimum.
    pub contrast_normal: f64,
    pub contrast_large: f64,
}

impl Default for ComplianceThresholds {
    fn default() -> Self {
        Self {
            color_weight: 0.4,
            contrast_weight: 0.3,
            policy_weight: 0.3,
            pass_threshold: 70.0,
            contrast_normal: WCAG_AA_NORMAL,
            contrast_large: WCAG_AA_LARGE,
        }
    }
}

/// Everything the validator needs to know about the copy on the canvas.
#[derive(Debug, Clone, Default)]
pub struct RenderedCopy {
    /// (field, text) for every piece of copy actually drawn.
    pub texts: Vec<(String, String)>,
    pub text_color: Rgb,
    /// Where overlay text was drawn; empty falls back to fixed bands.
    pub text_regions: Vec<PixelRect>,
    /// Canvas-sized mask of glyph and stroke pixels; these are never
    /// sampled as background.
    pub ink_mask: Option<GrayImage>,
    /// Whether the placed logo kept its safe zone; `None` when no logo.
    pub logo_safe_zone: Option<bool>,
}

impl RenderedCopy {
    pub fn has_overlay_text(&self) -> bool {
        !self.text_regions.is_empty()
            || self
                .texts
                .iter()
                .any(|(field, text)| field != "cta" && !text.trim().is_empty())
    }
}

pub trait BrandValidator: Send + Sync {
    fn validate(&self, image: &RgbaImage, copy: &RenderedCopy, tokens: &BrandTokens) -> ComplianceReport;
}

#[derive(Debug, Clone)]
pub struct ComplianceValidator {
    thresholds: ComplianceThresholds,
    quantization_levels: u32,
}

impl Default for ComplianceValidator {
    fn default() -> Self {
        Self::new(ComplianceThresholds::default(), 32)
    }
}

impl ComplianceValidator {
    pub fn new(thresholds: ComplianceThresholds, quantization_levels: u32) -> Self {
        Self {
            thresholds,
            quantization_levels,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            ComplianceThresholds {
                pass_threshold: config.pass_threshold,
                ..ComplianceThresholds::default()
            },
            config.quantization_levels,
        )
    }

    pub fn thresholds(&self) -> &ComplianceThresholds {
        &self.thresholds
    }
}

impl BrandValidator for ComplianceValidator {
    fn validate(&self, image: &RgbaImage, copy: &RenderedCopy, tokens: &BrandTokens) -> ComplianceReport {
        let t = &self.thresholds;

        let color = if image.width() == 0 || image.height() == 0 {
            SubScore::unavailable(t.color_weight, "empty image")
        } else {
            color_fidelity::score_color_fidelity(image, &tokens.palette, self.quantization_levels, t.color_weight)
        };

        let required = if tokens.palette.min_contrast > 0.0 {
            tokens.palette.min_contrast
        } else {
            t.contrast_normal
        };
        let contrast = if image.width() == 0 || image.height() == 0 {
            SubScore::unavailable(t.contrast_weight, "empty image")
        } else {
            contrast_check::score_contrast(
                image,
                copy.text_color,
                copy.ink_mask.as_ref(),
                &copy.text_regions,
                copy.has_overlay_text(),
                required,
                t,
            )
        };

        let outcome = policy::score_policy(
            &copy.texts,
            &tokens.forbidden_terms,
            copy.logo_safe_zone,
            tokens.logo.safe_zone_px,
            t.policy_weight,
        );
        let policy = outcome.sub_score.clone();

        let total_weight = color.weight + contrast.weight + policy.weight;
        let weighted = color.weighted() + contrast.weighted() + policy.weighted();
        let overall_score = if total_weight > 0.0 {
            (weighted / total_weight).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let overall_score = (overall_score * 10.0).round() / 10.0;
        let passed = overall_score >= t.pass_threshold;

        let (reasons, suggestions) = explain(&color, &contrast, &outcome, required);

        info!(
            score = overall_score,
            passed,
            color = color.score,
            contrast = contrast.score,
            policy = policy.score,
            "compliance validated"
        );

        ComplianceReport {
            overall_score,
            passed,
            threshold: t.pass_threshold,
            color,
            contrast,
            policy,
            reasons,
            suggestions,
        }
    }
}

fn explain(
    color: &SubScore,
    contrast: &SubScore,
    outcome: &policy::PolicyOutcome,
    required: f64,
) -> (Vec<String>, Vec<String>) {
    let policy = &outcome.sub_score;
    let mut reasons = Vec::new();
    let mut suggestions = Vec::new();

    if color.available && color.score < 70.0 {
        reasons.push(format!("Color fidelity is low ({:.0}/100)", color.score));
        suggestions.push("Use a background closer to the brand palette, or the palette gradient".to_string());
    }
    if contrast.available && contrast.score < 100.0 {
        reasons.push(format!(
            "Text contrast is below {required:.1}:1 ({:.0}/100)",
            contrast.score
        ));
        suggestions.push("Strengthen the scrim behind the text or switch to a darker background".to_string());
    }
    if outcome.term_violations > 0 {
        reasons.push(format!("{} forbidden term(s) in copy", outcome.term_violations));
        suggestions.push("Rewrite the copy without the flagged terms".to_string());
    }
    if outcome.logo_violation {
        reasons.push("Logo sits inside the brand safe zone".to_string());
        suggestions.push("Use a smaller logo variant or a corner anchor with more margin".to_string());
    }
    for sub in [color, contrast, policy] {
        if !sub.available {
            reasons.extend(sub.findings.iter().cloned());
        }
    }
    (reasons, suggestions)
}
