//! Brand tokens: palette, logo rules, copy policy and layout grid.
//!
//! Two JSON shapes are in circulation: the nested `{colors, logo, layout}` form
//! and an older flat form (`primary_color`, `logo_url`, `banned_words`, ...).
//! Both are adapted at load time into one validated `BrandTokens`; nothing
//! downstream ever sees the raw shapes or has to resolve a default.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::color::{ColorParseError, Rgb};
use crate::models::plan::{LogoAnchor, PaletteMode, UnknownAnchor};

// ────────────────────────────────────────────────────────────────────────────
// Defaults
// ────────────────────────────────────────────────────────────────────────────

const DEFAULT_TEXT: Rgb = Rgb::WHITE;
const DEFAULT_BACKGROUND: Rgb = Rgb::BLACK;
const DEFAULT_MIN_CONTRAST: f64 = 4.5;
const DEFAULT_LOGO_MIN_WIDTH: u32 = 120;
const DEFAULT_SAFE_ZONE: u32 = 24;
const DEFAULT_GRID: u32 = 12;
const DEFAULT_MARGIN: u32 = 48;
const DEFAULT_GUTTER: u32 = 16;
const DEFAULT_RADIUS: u32 = 24;
const MONO_DARKEN: f64 = 0.4;

pub const DEFAULT_CTA_WHITELIST: &[&str] = &[
    "Shop Now",
    "Learn More",
    "Sign Up",
    "Get Started",
    "Buy Now",
    "Book Now",
    "Download",
];

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to read brand tokens: {0}")]
    Io(#[from] std::io::Error),

    #[error("brand tokens are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required brand token '{0}'")]
    MissingField(&'static str),

    #[error("brand token '{field}': {source}")]
    InvalidColor {
        field: &'static str,
        #[source]
        source: ColorParseError,
    },

    #[error(transparent)]
    InvalidAnchor(#[from] UnknownAnchor),

    #[error("invalid brand token '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ────────────────────────────────────────────────────────────────────────────
// Validated representation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandPalette {
    pub primary: Rgb,
    pub secondary: Rgb,
    pub accent: Rgb,
    pub text: Rgb,
    pub background: Rgb,
    /// Minimum WCAG contrast the brand requires for body copy.
    pub min_contrast: f64,
}

impl BrandPalette {
    /// The five brand colors, in a fixed order.
    pub fn colors(&self) -> [Rgb; 5] {
        [
            self.primary,
            self.secondary,
            self.accent,
            self.text,
            self.background,
        ]
    }

    /// Fill color for emphasis elements (buttons) under a palette mode.
    pub fn mode_color(&self, mode: PaletteMode) -> Rgb {
        match mode {
            PaletteMode::Primary => self.primary,
            PaletteMode::Secondary => self.secondary,
            PaletteMode::Accent => self.accent,
            PaletteMode::Mono => self.primary.darken(MONO_DARKEN),
        }
    }

    /// Two-stop gradient used when no background image is available.
    pub fn gradient_stops(&self, mode: PaletteMode) -> (Rgb, Rgb) {
        match mode {
            PaletteMode::Primary => (self.primary, self.secondary),
            PaletteMode::Secondary => (self.primary, self.accent),
            PaletteMode::Accent => (self.accent, self.secondary),
            PaletteMode::Mono => (self.primary, self.primary.darken(MONO_DARKEN)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoVariant {
    Light,
    Dark,
    #[serde(alias = "full-color", alias = "fullcolor", alias = "color", alias = "full")]
    FullColor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoAsset {
    /// Variant → image URL (http(s) or `data:` URL).
    pub variants: BTreeMap<LogoVariant, String>,
    pub min_width_px: u32,
    pub safe_zone_px: u32,
    pub allowed_positions: Vec<LogoAnchor>,
}

impl LogoAsset {
    pub fn available_variants(&self) -> Vec<LogoVariant> {
        self.variants.keys().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRules {
    pub grid_columns: u32,
    pub grid_rows: u32,
    pub margin_px: u32,
    pub gutter_px: u32,
    pub corner_radius_px: u32,
}

impl Default for LayoutRules {
    fn default() -> Self {
        Self {
            grid_columns: DEFAULT_GRID,
            grid_rows: DEFAULT_GRID,
            margin_px: DEFAULT_MARGIN,
            gutter_px: DEFAULT_GUTTER,
            corner_radius_px: DEFAULT_RADIUS,
        }
    }
}

/// Everything the engine needs to know about a brand. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandTokens {
    pub name: String,
    pub palette: BrandPalette,
    pub logo: LogoAsset,
    pub cta_whitelist: Vec<String>,
    pub forbidden_terms: Vec<String>,
    pub layout: LayoutRules,
}

impl BrandTokens {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TokenError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, TokenError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_json_value(value)
    }

    /// Detects the schema once and adapts it into the validated struct.
    pub fn from_json_value(value: Value) -> Result<Self, TokenError> {
        let is_nested = value.get("colors").map(Value::is_object).unwrap_or(false);
        let shape = if is_nested {
            debug!("brand tokens: nested schema");
            RawShape::from(serde_json::from_value::<NestedTokens>(value)?)
        } else {
            debug!("brand tokens: legacy flat schema");
            RawShape::from(serde_json::from_value::<FlatTokens>(value)?)
        };
        shape.resolve()
    }

    /// Case- and whitespace-insensitive whitelist check.
    pub fn is_cta_allowed(&self, cta: &str) -> bool {
        let wanted = normalize_copy(cta);
        self.cta_whitelist.iter().any(|w| normalize_copy(w) == wanted)
    }
}

fn normalize_copy(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct NestedTokens {
    #[serde(default)]
    name: Option<String>,
    colors: NestedColors,
    #[serde(default)]
    min_contrast: Option<f64>,
    #[serde(default)]
    logo: Option<NestedLogo>,
    #[serde(default)]
    cta_whitelist: Option<Vec<String>>,
    #[serde(default)]
    forbidden_terms: Option<Vec<String>>,
    #[serde(default)]
    layout: Option<NestedLayout>,
}

#[derive(Debug, Default, Deserialize)]
struct NestedColors {
    primary: Option<String>,
    secondary: Option<String>,
    accent: Option<String>,
    text: Option<String>,
    background: Option<String>,
    #[serde(default)]
    min_contrast: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct NestedLogo {
    #[serde(default)]
    variants: BTreeMap<LogoVariant, String>,
    min_width_px: Option<u32>,
    safe_zone_px: Option<u32>,
    allowed_positions: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct NestedLayout {
    grid_columns: Option<u32>,
    grid_rows: Option<u32>,
    margin_px: Option<u32>,
    gutter_px: Option<u32>,
    corner_radius_px: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FlatTokens {
    brand_name: Option<String>,
    primary_color: Option<String>,
    secondary_color: Option<String>,
    accent_color: Option<String>,
    text_color: Option<String>,
    background_color: Option<String>,
    min_contrast_ratio: Option<f64>,
    logo_url: Option<String>,
    logo_light_url: Option<String>,
    logo_dark_url: Option<String>,
    logo_min_width: Option<u32>,
    logo_clear_space: Option<u32>,
    logo_positions: Option<Vec<String>>,
    allowed_ctas: Option<Vec<String>>,
    banned_words: Option<Vec<String>>,
    grid_columns: Option<u32>,
    spacing: Option<u32>,
    border_radius: Option<u32>,
}

/// Common intermediate both wire shapes collapse into before validation.
#[derive(Debug, Default)]
struct RawShape {
    name: Option<String>,
    primary: Option<String>,
    secondary: Option<String>,
    accent: Option<String>,
    text: Option<String>,
    background: Option<String>,
    min_contrast: Option<f64>,
    variants: BTreeMap<LogoVariant, String>,
    logo_min_width: Option<u32>,
    safe_zone: Option<u32>,
    positions: Option<Vec<String>>,
    cta_whitelist: Option<Vec<String>>,
    forbidden_terms: Option<Vec<String>>,
    grid_columns: Option<u32>,
    grid_rows: Option<u32>,
    margin: Option<u32>,
    gutter: Option<u32>,
    radius: Option<u32>,
}

impl From<NestedTokens> for RawShape {
    fn from(n: NestedTokens) -> Self {
        let logo = n.logo.unwrap_or_default();
        let layout = n.layout.unwrap_or_default();
        RawShape {
            name: n.name,
            primary: n.colors.primary,
            secondary: n.colors.secondary,
            accent: n.colors.accent,
            text: n.colors.text,
            background: n.colors.background,
            min_contrast: n.min_contrast.or(n.colors.min_contrast),
            variants: logo.variants,
            logo_min_width: logo.min_width_px,
            safe_zone: logo.safe_zone_px,
            positions: logo.allowed_positions,
            cta_whitelist: n.cta_whitelist,
            forbidden_terms: n.forbidden_terms,
            grid_columns: layout.grid_columns,
            grid_rows: layout.grid_rows,
            margin: layout.margin_px,
            gutter: layout.gutter_px,
            radius: layout.corner_radius_px,
        }
    }
}

impl From<FlatTokens> for RawShape {
    fn from(f: FlatTokens) -> Self {
        let mut variants = BTreeMap::new();
        if let Some(url) = f.logo_url {
            variants.insert(LogoVariant::FullColor, url);
        }
        if let Some(url) = f.logo_light_url {
            variants.insert(LogoVariant::Light, url);
        }
        if let Some(url) = f.logo_dark_url {
            variants.insert(LogoVariant::Dark, url);
        }
        RawShape {
            name: f.brand_name,
            primary: f.primary_color,
            secondary: f.secondary_color,
            accent: f.accent_color,
            text: f.text_color,
            background: f.background_color,
            min_contrast: f.min_contrast_ratio,
            variants,
            logo_min_width: f.logo_min_width,
            safe_zone: f.logo_clear_space,
            positions: f.logo_positions,
            cta_whitelist: f.allowed_ctas,
            forbidden_terms: f.banned_words,
            grid_columns: f.grid_columns,
            grid_rows: f.grid_columns,
            margin: f.spacing.map(|s| s.saturating_mul(2)),
            gutter: f.spacing,
            radius: f.border_radius,
        }
    }
}

impl RawShape {
    fn resolve(self) -> Result<BrandTokens, TokenError> {
        let primary = parse_required(self.primary, "primary")?;
        let secondary = parse_required(self.secondary, "secondary")?;
        let accent = parse_optional(self.accent, "accent")?.unwrap_or(secondary);
        let text = parse_optional(self.text, "text")?.unwrap_or(DEFAULT_TEXT);
        let background = parse_optional(self.background, "background")?.unwrap_or(DEFAULT_BACKGROUND);

        let min_contrast = self.min_contrast.unwrap_or(DEFAULT_MIN_CONTRAST);
        if !(1.0..=21.0).contains(&min_contrast) {
            return Err(TokenError::Invalid {
                field: "min_contrast",
                reason: format!("{min_contrast} is outside 1..=21"),
            });
        }

        let allowed_positions = match self.positions {
            Some(codes) if !codes.is_empty() => codes
                .iter()
                .map(|c| c.parse::<LogoAnchor>())
                .collect::<Result<Vec<_>, _>>()?,
            _ => LogoAnchor::ALL.to_vec(),
        };

        let min_width_px = self.logo_min_width.unwrap_or(DEFAULT_LOGO_MIN_WIDTH);
        if min_width_px == 0 {
            return Err(TokenError::Invalid {
                field: "logo.min_width_px",
                reason: "must be positive".to_string(),
            });
        }

        let layout = LayoutRules {
            grid_columns: self.grid_columns.unwrap_or(DEFAULT_GRID).max(1),
            grid_rows: self.grid_rows.unwrap_or(DEFAULT_GRID).max(1),
            margin_px: self.margin.unwrap_or(DEFAULT_MARGIN),
            gutter_px: self.gutter.unwrap_or(DEFAULT_GUTTER),
            corner_radius_px: self.radius.unwrap_or(DEFAULT_RADIUS),
        };

        let cta_whitelist = match self.cta_whitelist {
            Some(list) if !list.is_empty() => list,
            _ => DEFAULT_CTA_WHITELIST.iter().map(|s| s.to_string()).collect(),
        };

        let forbidden_terms = self
            .forbidden_terms
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(BrandTokens {
            name: self.name.unwrap_or_else(|| "unnamed".to_string()),
            palette: BrandPalette {
                primary,
                secondary,
                accent,
                text,
                background,
                min_contrast,
            },
            logo: LogoAsset {
                variants: self.variants,
                min_width_px,
                safe_zone_px: self.safe_zone.unwrap_or(DEFAULT_SAFE_ZONE),
                allowed_positions,
            },
            cta_whitelist,
            forbidden_terms,
            layout,
        })
    }
}

fn parse_required(value: Option<String>, field: &'static str) -> Result<Rgb, TokenError> {
    parse_optional(value, field)?.ok_or(TokenError::MissingField(field))
}

fn parse_optional(value: Option<String>, field: &'static str) -> Result<Option<Rgb>, TokenError> {
    value
        .map(|hex| Rgb::from_hex(&hex).map_err(|source| TokenError::InvalidColor { field, source }))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r##"{
        "name": "Acme",
        "colors": {
            "primary": "#E63946",
            "secondary": "#1D3557",
            "accent": "#F1FAEE",
            "text": "#FFFFFF",
            "background": "#0B0B0B"
        },
        "min_contrast": 4.5,
        "logo": {
            "variants": {"light": "https://cdn/l.png", "full-color": "https://cdn/c.png"},
            "min_width_px": 160,
            "safe_zone_px": 32,
            "allowed_positions": ["TL", "TR", "bottom-center"]
        },
        "cta_whitelist": ["Shop Now"],
        "forbidden_terms": ["cheap", " "],
        "layout": {"grid_columns": 6, "margin_px": 40}
    }"##;

    const FLAT: &str = r##"{
        "brand_name": "Acme",
        "primary_color": "#E63946",
        "secondary_color": "#1D3557",
        "logo_url": "https://cdn/c.png",
        "logo_dark_url": "https://cdn/d.png",
        "logo_clear_space": 20,
        "allowed_ctas": ["Learn More"],
        "banned_words": ["free"],
        "spacing": 12
    }"##;

    #[test]
    fn test_nested_schema_loads() {
        let tokens = BrandTokens::from_json_str(NESTED).unwrap();
        assert_eq!(tokens.name, "Acme");
        assert_eq!(tokens.palette.primary, Rgb::new(0xE6, 0x39, 0x46));
        assert_eq!(tokens.logo.min_width_px, 160);
        assert_eq!(tokens.logo.safe_zone_px, 32);
        assert_eq!(
            tokens.logo.available_variants(),
            vec![LogoVariant::Light, LogoVariant::FullColor]
        );
        assert_eq!(tokens.logo.allowed_positions.len(), 3);
        assert_eq!(tokens.forbidden_terms, vec!["cheap".to_string()]);
        assert_eq!(tokens.layout.grid_columns, 6);
        assert_eq!(tokens.layout.grid_rows, 12);
        assert_eq!(tokens.layout.margin_px, 40);
    }

    #[test]
    fn test_flat_schema_adapts_to_same_representation() {
        let tokens = BrandTokens::from_json_str(FLAT).unwrap();
        assert_eq!(tokens.palette.secondary, Rgb::new(0x1D, 0x35, 0x57));
        assert_eq!(tokens.palette.accent, tokens.palette.secondary, "accent defaults to secondary");
        assert_eq!(tokens.logo.safe_zone_px, 20);
        assert_eq!(
            tokens.logo.available_variants(),
            vec![LogoVariant::Dark, LogoVariant::FullColor]
        );
        assert_eq!(tokens.cta_whitelist, vec!["Learn More".to_string()]);
        assert_eq!(tokens.forbidden_terms, vec!["free".to_string()]);
        assert_eq!(tokens.layout.gutter_px, 12);
        assert_eq!(tokens.layout.margin_px, 24);
    }

    #[test]
    fn test_flat_spacing_at_u32_max_saturates_margin() {
        let json = format!(
            r##"{{"primary_color": "#111111", "secondary_color": "#222222", "spacing": {}}}"##,
            u32::MAX
        );
        let tokens = BrandTokens::from_json_str(&json).unwrap();
        assert_eq!(tokens.layout.gutter_px, u32::MAX);
        assert_eq!(tokens.layout.margin_px, u32::MAX);
    }

    #[test]
    fn test_defaults_resolved_once() {
        let tokens = BrandTokens::from_json_str(
            r##"{"colors": {"primary": "#111111", "secondary": "#222222"}}"##,
        )
        .unwrap();
        assert_eq!(tokens.palette.text, Rgb::WHITE);
        assert_eq!(tokens.palette.background, Rgb::BLACK);
        assert_eq!(tokens.palette.min_contrast, 4.5);
        assert_eq!(tokens.logo.min_width_px, 120);
        assert_eq!(tokens.logo.safe_zone_px, 24);
        assert_eq!(tokens.logo.allowed_positions, LogoAnchor::ALL.to_vec());
        assert!(tokens.logo.variants.is_empty());
        assert!(tokens.is_cta_allowed("Get Started"));
        assert_eq!(tokens.layout, LayoutRules::default());
    }

    #[test]
    fn test_missing_primary_is_error() {
        let err = BrandTokens::from_json_str(r##"{"colors": {"secondary": "#222222"}}"##)
            .unwrap_err();
        assert!(matches!(err, TokenError::MissingField("primary")), "got {err}");
    }

    #[test]
    fn test_bad_hex_names_the_field() {
        let err = BrandTokens::from_json_str(
            r##"{"colors": {"primary": "#11", "secondary": "#222222"}}"##,
        )
        .unwrap_err();
        assert!(err.to_string().contains("primary"), "got {err}");
    }

    #[test]
    fn test_bad_anchor_is_error() {
        let err = BrandTokens::from_json_str(
            r##"{"primary_color": "#111111", "secondary_color": "#222222", "logo_positions": ["left-ish"]}"##,
        )
        .unwrap_err();
        assert!(matches!(err, TokenError::InvalidAnchor(_)), "got {err}");
    }

    #[test]
    fn test_gradient_stops_follow_palette_mode() {
        let p = BrandTokens::from_json_str(NESTED).unwrap().palette;
        assert_eq!(p.gradient_stops(PaletteMode::Primary), (p.primary, p.secondary));
        assert_eq!(p.gradient_stops(PaletteMode::Secondary), (p.primary, p.accent));
        assert_eq!(p.gradient_stops(PaletteMode::Accent), (p.accent, p.secondary));
        let (start, end) = p.gradient_stops(PaletteMode::Mono);
        assert_eq!(start, p.primary);
        assert_eq!(end, p.primary.darken(0.4));
    }

    #[test]
    fn test_mode_color() {
        let p = BrandTokens::from_json_str(NESTED).unwrap().palette;
        assert_eq!(p.mode_color(PaletteMode::Primary), p.primary);
        assert_eq!(p.mode_color(PaletteMode::Accent), p.accent);
    }
}
