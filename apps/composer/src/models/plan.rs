//! Design plan: the content and intent of one graphic, authored upstream.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::brand::BrandTokens;

pub const MAX_HEADLINE_WORDS: usize = 7;
pub const MAX_SUBHEAD_WORDS: usize = 16;

// ────────────────────────────────────────────────────────────────────────────
// Aspect ratio
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1x1", alias = "1:1")]
    Square,
    #[serde(rename = "4x5", alias = "4:5")]
    Portrait,
    #[serde(rename = "9x16", alias = "9:16")]
    Story,
    #[serde(rename = "16x9", alias = "16:9")]
    Landscape,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 4] = [
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Story,
        AspectRatio::Landscape,
    ];

    /// Fixed output canvas in pixels, `(width, height)`.
    pub const fn canvas_size(self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1080, 1080),
            AspectRatio::Portrait => (1080, 1350),
            AspectRatio::Story => (1080, 1920),
            AspectRatio::Landscape => (1920, 1080),
        }
    }

    pub const fn code(self) -> &'static str {
        match self {
            AspectRatio::Square => "1x1",
            AspectRatio::Portrait => "4x5",
            AspectRatio::Story => "9x16",
            AspectRatio::Landscape => "16x9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Palette mode
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaletteMode {
    Primary,
    Secondary,
    Accent,
    Mono,
}

// ────────────────────────────────────────────────────────────────────────────
// Logo anchor
// ────────────────────────────────────────────────────────────────────────────

/// Where the logo is anchored on the canvas. Serialized as its short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogoAnchor {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    TopCenter,
    BottomCenter,
    Center,
}

impl LogoAnchor {
    pub const ALL: [LogoAnchor; 7] = [
        LogoAnchor::TopLeft,
        LogoAnchor::TopRight,
        LogoAnchor::BottomLeft,
        LogoAnchor::BottomRight,
        LogoAnchor::TopCenter,
        LogoAnchor::BottomCenter,
        LogoAnchor::Center,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            LogoAnchor::TopLeft => "TL",
            LogoAnchor::TopRight => "TR",
            LogoAnchor::BottomLeft => "BL",
            LogoAnchor::BottomRight => "BR",
            LogoAnchor::TopCenter => "top-center",
            LogoAnchor::BottomCenter => "bottom-center",
            LogoAnchor::Center => "center",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown logo anchor '{0}'")]
pub struct UnknownAnchor(pub String);

impl FromStr for LogoAnchor {
    type Err = UnknownAnchor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "tl" | "top-left" => Ok(LogoAnchor::TopLeft),
            "tr" | "top-right" => Ok(LogoAnchor::TopRight),
            "bl" | "bottom-left" => Ok(LogoAnchor::BottomLeft),
            "br" | "bottom-right" => Ok(LogoAnchor::BottomRight),
            "tc" | "top-center" => Ok(LogoAnchor::TopCenter),
            "bc" | "bottom-center" => Ok(LogoAnchor::BottomCenter),
            "c" | "center" => Ok(LogoAnchor::Center),
            _ => Err(UnknownAnchor(s.to_string())),
        }
    }
}

impl TryFrom<String> for LogoAnchor {
    type Error = UnknownAnchor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LogoAnchor> for String {
    fn from(value: LogoAnchor) -> Self {
        value.code().to_string()
    }
}

impl fmt::Display for LogoAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Design plan
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignPlan {
    pub headline: String,
    #[serde(default)]
    pub subhead: String,
    pub cta_text: String,
    #[serde(default)]
    pub visual_concept: String,
    pub channel: String,
    pub aspect_ratio: AspectRatio,
    pub palette_mode: PaletteMode,
    pub logo_position: LogoAnchor,
    #[serde(default)]
    pub product_image_needed: bool,
    /// Source for the product slot when `product_image_needed` is set.
    #[serde(default)]
    pub product_image_url: Option<String>,
}

/// A single reason a plan cannot be composed for a given brand.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PlanViolation {
    #[error("headline is empty")]
    EmptyHeadline,
    #[error("headline has {words} words (max {max})")]
    HeadlineTooLong { words: usize, max: usize },
    #[error("subhead has {words} words (max {max})")]
    SubheadTooLong { words: usize, max: usize },
    #[error("CTA '{0}' is not in the brand whitelist")]
    CtaNotWhitelisted(String),
    #[error("logo position '{0}' is not allowed by the brand")]
    LogoPositionNotAllowed(LogoAnchor),
}

impl DesignPlan {
    /// Total words across headline, subhead and CTA.
    pub fn word_count(&self) -> usize {
        count_words(&self.headline) + count_words(&self.subhead) + count_words(&self.cta_text)
    }

    /// Channel normalized for matching (`"Instagram Story"` → `"instagram_story"`).
    pub fn channel_key(&self) -> String {
        normalize_channel(&self.channel)
    }

    /// Every piece of copy that ends up on the canvas, labelled by field.
    pub fn copy_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("headline", self.headline.as_str()),
            ("subhead", self.subhead.as_str()),
            ("cta", self.cta_text.as_str()),
        ]
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .collect()
    }

    /// Checks the plan against the brand's rules. Returns every violation found.
    pub fn validate(&self, tokens: &BrandTokens) -> Result<(), Vec<PlanViolation>> {
        let mut violations = Vec::new();

        let headline_words = count_words(&self.headline);
        if headline_words == 0 {
            violations.push(PlanViolation::EmptyHeadline);
        } else if headline_words > MAX_HEADLINE_WORDS {
            violations.push(PlanViolation::HeadlineTooLong {
                words: headline_words,
                max: MAX_HEADLINE_WORDS,
            });
        }

        let subhead_words = count_words(&self.subhead);
        if subhead_words > MAX_SUBHEAD_WORDS {
            violations.push(PlanViolation::SubheadTooLong {
                words: subhead_words,
                max: MAX_SUBHEAD_WORDS,
            });
        }

        if !tokens.is_cta_allowed(&self.cta_text) {
            violations.push(PlanViolation::CtaNotWhitelisted(self.cta_text.clone()));
        }

        if !tokens.logo.allowed_positions.contains(&self.logo_position) {
            violations.push(PlanViolation::LogoPositionNotAllowed(self.logo_position));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn normalize_channel(channel: &str) -> String {
    channel
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
