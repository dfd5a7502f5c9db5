//! Template Selector: ranks catalog templates against a design plan.
//!
//! No randomness and no I/O: the same (plan, catalog) always yields the same
//! template id.

use serde::Serialize;
use tracing::debug;

use super::catalog::{default_template, DensityClass, LayoutTemplate, TemplateCatalog};
use super::density::{analyze_density, ContentDensity};
use crate::models::DesignPlan;

// ────────────────────────────────────────────────────────────────────────────
// Scoring weights
// ────────────────────────────────────────────────────────────────────────────

const RATIO_MATCH: u32 = 10;
const CATEGORY_EXACT: u32 = 30;
/// Balanced sits between text-heavy and image-heavy and earns partial credit.
const CATEGORY_ADJACENT: u32 = 15;
const CHANNEL_MATCH: u32 = 10;
const PRODUCT_SLOT_MATCH: u32 = 10;

/// Which candidate pool the winner came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionTier {
    ChannelAndRatio,
    RatioOnly,
    Default,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateSelection {
    pub template: LayoutTemplate,
    pub score: u32,
    pub density: ContentDensity,
    pub tier: SelectionTier,
}

pub fn category_score(template: DensityClass, content: DensityClass) -> u32 {
    if template == content {
        CATEGORY_EXACT
    } else if template == DensityClass::Balanced || content == DensityClass::Balanced {
        CATEGORY_ADJACENT
    } else {
        0
    }
}

pub fn score_template(template: &LayoutTemplate, plan: &DesignPlan, density: &ContentDensity) -> u32 {
    let channel_key = plan.channel_key();
    let mut score = 0;
    if template.supports_ratio(plan.aspect_ratio) {
        score += RATIO_MATCH;
    }
    score += category_score(template.category, density.class);
    if template.supports_channel(&channel_key) {
        score += CHANNEL_MATCH;
    }
    if template.has_product_slot() == plan.product_image_needed {
        score += PRODUCT_SLOT_MATCH;
    }
    score
}

/// Picks the best template for `plan`. Never fails.
///
/// Candidate pools, first non-empty wins:
/// 1. templates supporting both the plan's channel and aspect ratio
/// 2. templates supporting the aspect ratio
/// 3. the hard-coded default template
///
/// Within a pool the highest score wins; ties go to the earlier catalog entry.
pub fn select_template(plan: &DesignPlan, catalog: &TemplateCatalog) -> TemplateSelection {
    let density = analyze_density(plan);
    let channel_key = plan.channel_key();

    let by_ratio: Vec<&LayoutTemplate> = catalog
        .templates()
        .iter()
        .filter(|t| t.supports_ratio(plan.aspect_ratio))
        .collect();
    let by_channel_and_ratio: Vec<&LayoutTemplate> = by_ratio
        .iter()
        .copied()
        .filter(|t| t.supports_channel(&channel_key))
        .collect();

    let (pool, tier) = if !by_channel_and_ratio.is_empty() {
        (by_channel_and_ratio, SelectionTier::ChannelAndRatio)
    } else if !by_ratio.is_empty() {
        (by_ratio, SelectionTier::RatioOnly)
    } else {
        let fallback = default_template();
        let score = score_template(&fallback, plan, &density);
        debug!(
            ratio = %plan.aspect_ratio,
            template = %fallback.id,
            "no catalog template supports ratio, using default"
        );
        return TemplateSelection {
            template: fallback,
            score,
            density,
            tier: SelectionTier::Default,
        };
    };

    let mut best: Option<(&LayoutTemplate, u32)> = None;
    for template in pool {
        let score = score_template(template, plan, &density);
        // Strict comparison keeps the earliest template on ties.
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((template, score));
        }
    }

    match best {
        Some((template, score)) => {
            debug!(
                template = %template.id,
                score,
                density = density.class.as_str(),
                ?tier,
                "template selected"
            );
            TemplateSelection {
                template: template.clone(),
                score,
                density,
                tier,
            }
        }
        None => TemplateSelection {
            template: default_template(),
            score: 0,
            density,
            tier: SelectionTier::Default,
        },
    }
}
