//! Slot-based layout templates and the built-in catalog.
//!
//! Slot rectangles are expressed in grid cells of the brand's layout grid
//! (default 12×12) so one template serves every canvas size. `Full` covers the
//! whole canvas, ignoring margins.

use serde::{Deserialize, Serialize};

use crate::models::AspectRatio;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    Background,
    Text,
    Button,
    Logo,
    GradientOverlay,
    Product,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SlotRect {
    Full,
    Cells {
        col: u32,
        row: u32,
        col_span: u32,
        row_span: u32,
    },
}

impl SlotRect {
    pub const fn cells(col: u32, row: u32, col_span: u32, row_span: u32) -> Self {
        SlotRect::Cells {
            col,
            row,
            col_span,
            row_span,
        }
    }
}

/// Which copy field a text slot renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRole {
    Headline,
    Subhead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Rendering hints. Unset fields fall back to compositor defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SlotStyle {
    pub text_role: Option<TextRole>,
    pub font_size_px: Option<u32>,
    #[serde(default)]
    pub align: TextAlign,
    /// Maximum scrim alpha (0–1) for gradient overlays.
    pub overlay_opacity: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: String,
    pub slot_type: SlotType,
    pub z: i32,
    pub rect: SlotRect,
    #[serde(default)]
    pub style: SlotStyle,
}

/// Content-density category a template is designed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityClass {
    TextHeavy,
    ImageHeavy,
    Balanced,
}

impl DensityClass {
    pub fn as_str(self) -> &'static str {
        match self {
            DensityClass::TextHeavy => "text_heavy",
            DensityClass::ImageHeavy => "image_heavy",
            DensityClass::Balanced => "balanced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutTemplate {
    pub id: String,
    pub aspect_ratios: Vec<AspectRatio>,
    /// Normalized channel keys (`instagram`, `linkedin`, ...). Empty means any channel.
    pub channels: Vec<String>,
    pub category: DensityClass,
    pub slots: Vec<Slot>,
}

impl LayoutTemplate {
    pub fn supports_ratio(&self, ratio: AspectRatio) -> bool {
        self.aspect_ratios.contains(&ratio)
    }

    /// A channel matches when equal, or when one is a `_`-delimited prefix of
    /// the other (`instagram` matches `instagram_story`).
    pub fn supports_channel(&self, channel_key: &str) -> bool {
        self.channels.iter().any(|c| channel_matches(c, channel_key))
    }

    pub fn has_product_slot(&self) -> bool {
        self.slots.iter().any(|s| s.slot_type == SlotType::Product)
    }

    /// Slots sorted by ascending z; equal z keeps declaration order.
    pub fn slots_in_z_order(&self) -> Vec<&Slot> {
        let mut slots: Vec<&Slot> = self.slots.iter().collect();
        slots.sort_by_key(|s| s.z);
        slots
    }
}

fn channel_matches(template_channel: &str, plan_channel: &str) -> bool {
    if template_channel.is_empty() || plan_channel.is_empty() {
        return false;
    }
    if template_channel == plan_channel {
        return true;
    }
    let prefixed = |long: &str, short: &str| {
        long.strip_prefix(short)
            .map(|rest| rest.starts_with('_'))
            .unwrap_or(false)
    };
    prefixed(plan_channel, template_channel) || prefixed(template_channel, plan_channel)
}

// ────────────────────────────────────────────────────────────────────────────
// Catalog
// ────────────────────────────────────────────────────────────────────────────

/// Ordered, read-only template collection. Order is the selection tie-breaker.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<LayoutTemplate>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<LayoutTemplate>) -> Self {
        Self { templates }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_templates())
    }

    pub fn templates(&self) -> &[LayoutTemplate] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Option<&LayoutTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

pub const DEFAULT_TEMPLATE_ID: &str = "default-fallback";

fn slot(id: &str, slot_type: SlotType, z: i32, rect: SlotRect) -> Slot {
    Slot {
        id: id.to_string(),
        slot_type,
        z,
        rect,
        style: SlotStyle::default(),
    }
}

fn text_slot(id: &str, role: TextRole, z: i32, rect: SlotRect, size: Option<u32>) -> Slot {
    Slot {
        style: SlotStyle {
            text_role: Some(role),
            font_size_px: size,
            ..SlotStyle::default()
        },
        ..slot(id, SlotType::Text, z, rect)
    }
}

fn overlay_slot(z: i32, rect: SlotRect, opacity: f32) -> Slot {
    Slot {
        style: SlotStyle {
            overlay_opacity: Some(opacity),
            ..SlotStyle::default()
        },
        ..slot("scrim", SlotType::GradientOverlay, z, rect)
    }
}

/// Hard-coded template used when nothing in the catalog supports the ratio.
/// Valid for every aspect ratio.
pub fn default_template() -> LayoutTemplate {
    LayoutTemplate {
        id: DEFAULT_TEMPLATE_ID.to_string(),
        aspect_ratios: AspectRatio::ALL.to_vec(),
        channels: vec![],
        category: DensityClass::Balanced,
        slots: vec![
            slot("background", SlotType::Background, 0, SlotRect::Full),
            overlay_slot(1, SlotRect::cells(0, 6, 12, 6), 0.55),
            text_slot("headline", TextRole::Headline, 2, SlotRect::cells(0, 6, 12, 2), None),
            text_slot("subhead", TextRole::Subhead, 2, SlotRect::cells(0, 8, 12, 2), None),
            slot("cta", SlotType::Button, 3, SlotRect::cells(3, 10, 6, 1)),
            slot("logo", SlotType::Logo, 4, SlotRect::Full),
        ],
    }
}

fn string_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn builtin_templates() -> Vec<LayoutTemplate> {
    use AspectRatio::*;

    vec![
        LayoutTemplate {
            id: "hero-balanced".to_string(),
            aspect_ratios: vec![Square, Portrait],
            channels: string_list(&["instagram", "facebook", "linkedin"]),
            category: DensityClass::Balanced,
            slots: vec![
                slot("background", SlotType::Background, 0, SlotRect::Full),
                overlay_slot(1, SlotRect::cells(0, 6, 12, 6), 0.55),
                text_slot("headline", TextRole::Headline, 2, SlotRect::cells(0, 6, 12, 2), None),
                text_slot("subhead", TextRole::Subhead, 2, SlotRect::cells(0, 8, 12, 2), None),
                slot("cta", SlotType::Button, 3, SlotRect::cells(3, 10, 6, 1)),
                slot("logo", SlotType::Logo, 4, SlotRect::Full),
            ],
        },
        LayoutTemplate {
            id: "headline-stack".to_string(),
            aspect_ratios: vec![Square, Portrait, Landscape],
            channels: string_list(&["linkedin", "facebook", "twitter", "email"]),
            category: DensityClass::TextHeavy,
            slots: vec![
                slot("background", SlotType::Background, 0, SlotRect::Full),
                overlay_slot(1, SlotRect::Full, 0.65),
                text_slot("headline", TextRole::Headline, 2, SlotRect::cells(0, 2, 12, 3), Some(96)),
                text_slot("subhead", TextRole::Subhead, 2, SlotRect::cells(0, 5, 12, 4), Some(48)),
                slot("cta", SlotType::Button, 3, SlotRect::cells(3, 10, 6, 1)),
                slot("logo", SlotType::Logo, 4, SlotRect::Full),
            ],
        },
        LayoutTemplate {
            id: "image-focus".to_string(),
            aspect_ratios: AspectRatio::ALL.to_vec(),
            channels: string_list(&["instagram", "pinterest", "display"]),
            category: DensityClass::ImageHeavy,
            slots: vec![
                slot("background", SlotType::Background, 0, SlotRect::Full),
                overlay_slot(1, SlotRect::cells(0, 8, 12, 4), 0.45),
                text_slot("headline", TextRole::Headline, 2, SlotRect::cells(0, 9, 12, 1), Some(72)),
                slot("cta", SlotType::Button, 3, SlotRect::cells(4, 10, 4, 1)),
                slot("logo", SlotType::Logo, 4, SlotRect::Full),
            ],
        },
        LayoutTemplate {
            id: "product-spotlight".to_string(),
            aspect_ratios: vec![Square, Portrait, Landscape],
            channels: string_list(&["instagram", "facebook", "display", "email"]),
            category: DensityClass::ImageHeavy,
            slots: vec![
                slot("background", SlotType::Background, 0, SlotRect::Full),
                slot("product", SlotType::Product, 1, SlotRect::cells(6, 1, 6, 8)),
                overlay_slot(2, SlotRect::cells(0, 8, 12, 4), 0.5),
                text_slot("headline", TextRole::Headline, 3, SlotRect::cells(0, 2, 6, 3), Some(80)),
                text_slot("subhead", TextRole::Subhead, 3, SlotRect::cells(0, 5, 6, 3), Some(40)),
                slot("cta", SlotType::Button, 4, SlotRect::cells(0, 10, 5, 1)),
                slot("logo", SlotType::Logo, 5, SlotRect::Full),
            ],
        },
        LayoutTemplate {
            id: "story-vertical".to_string(),
            aspect_ratios: vec![Story],
            channels: string_list(&["instagram_story", "tiktok", "snapchat"]),
            category: DensityClass::Balanced,
            slots: vec![
                slot("background", SlotType::Background, 0, SlotRect::Full),
                overlay_slot(1, SlotRect::cells(0, 5, 12, 7), 0.6),
                text_slot("headline", TextRole::Headline, 2, SlotRect::cells(0, 5, 12, 2), Some(104)),
                text_slot("subhead", TextRole::Subhead, 2, SlotRect::cells(0, 7, 12, 2), Some(52)),
                slot("cta", SlotType::Button, 3, SlotRect::cells(2, 10, 8, 1)),
                slot("logo", SlotType::Logo, 4, SlotRect::Full),
            ],
        },
        LayoutTemplate {
            id: "wide-banner".to_string(),
            aspect_ratios: vec![Landscape],
            channels: string_list(&["youtube", "twitter", "linkedin", "display"]),
            category: DensityClass::Balanced,
            slots: vec![
                slot("background", SlotType::Background, 0, SlotRect::Full),
                overlay_slot(1, SlotRect::cells(0, 0, 7, 12), 0.55),
                text_slot("headline", TextRole::Headline, 2, SlotRect::cells(0, 3, 7, 3), Some(88)),
                text_slot("subhead", TextRole::Subhead, 2, SlotRect::cells(0, 6, 7, 2), Some(44)),
                slot("cta", SlotType::Button, 3, SlotRect::cells(0, 9, 3, 1)),
                slot("logo", SlotType::Logo, 4, SlotRect::Full),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_ids_are_unique() {
        let catalog = TemplateCatalog::builtin();
        let ids: HashSet<&str> = catalog.templates().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), catalog.templates().len());
        assert!(!ids.contains(DEFAULT_TEMPLATE_ID));
    }

    #[test]
    fn test_every_ratio_has_a_builtin_template() {
        let catalog = TemplateCatalog::builtin();
        for ratio in AspectRatio::ALL {
            assert!(
                catalog.templates().iter().any(|t| t.supports_ratio(ratio)),
                "no template for {ratio}"
            );
        }
    }

    #[test]
    fn test_cells_fit_twelve_by_twelve_grid() {
        let mut all = TemplateCatalog::builtin().templates().to_vec();
        all.push(default_template());
        for template in &all {
            for slot in &template.slots {
                if let SlotRect::Cells {
                    col,
                    row,
                    col_span,
                    row_span,
                } = slot.rect
                {
                    assert!(col + col_span <= 12, "{}:{} overflows columns", template.id, slot.id);
                    assert!(row + row_span <= 12, "{}:{} overflows rows", template.id, slot.id);
                    assert!(col_span > 0 && row_span > 0);
                }
            }
        }
    }

    #[test]
    fn test_z_order_is_stable() {
        let template = default_template();
        let ids: Vec<&str> = template.slots_in_z_order().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["background", "scrim", "headline", "subhead", "cta", "logo"]);
    }

    #[test]
    fn test_channel_prefix_matching() {
        assert!(channel_matches("instagram", "instagram"));
        assert!(channel_matches("instagram", "instagram_story"));
        assert!(channel_matches("instagram_story", "instagram"));
        assert!(!channel_matches("insta", "instagram"));
        assert!(!channel_matches("linkedin", ""));
    }

    #[test]
    fn test_only_spotlight_has_product_slot() {
        let catalog = TemplateCatalog::builtin();
        let with_product: Vec<&str> = catalog
            .templates()
            .iter()
            .filter(|t| t.has_product_slot())
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(with_product, vec!["product-spotlight"]);
    }
}
