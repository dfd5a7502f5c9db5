//! Grid Compositor: executes a template's slots onto a fixed-size canvas.
//!
//! Element failures (asset fetch, empty slot geometry) are recorded in
//! `skipped` and never abort the composition; a best-effort canvas is
//! always returned.

use std::sync::Arc;

use image::{DynamicImage, GrayImage, RgbaImage};
use serde::Serialize;
use tracing::{debug, warn};

use super::canvas::{
    draw_background_image, draw_scrim, draw_text, fill_rounded_rect, fill_vertical_gradient,
    new_canvas, paste_fit, TextStyle,
};
use super::font::{embedded_face, TextFace};
use super::wrap::wrap_text;
use crate::assets::AssetFetcher;
use crate::color::{best_text_color_on, Rgb};
use crate::layout::{GridSpec, LayoutTemplate, Slot, SlotType, TextAlign, TextRole};
use crate::logo::{place_logo, LogoPlacement};
use crate::models::{BrandTokens, DesignPlan, PixelRect};

pub const DEFAULT_HEADLINE_PX: u32 = 88;
pub const DEFAULT_SUBHEAD_PX: u32 = 44;
pub const DEFAULT_OVERLAY_OPACITY: f32 = 0.5;
/// Each shrink pass scales the font by this factor.
const SHRINK_FACTOR: f32 = 0.85;
const MAX_SHRINK_PASSES: u32 = 4;
const MAX_BUTTON_LABEL_PX: f32 = 40.0;

#[derive(Debug, Clone, Serialize)]
pub struct RenderedElement {
    pub slot_id: String,
    pub kind: SlotType,
    pub region: PixelRect,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedElement {
    pub slot_id: String,
    pub kind: SlotType,
    pub reason: String,
}

/// A piece of copy that was drawn, and where.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedText {
    pub field: &'static str,
    pub text: String,
    pub size_px: u32,
    pub region: PixelRect,
}

pub struct CompositorOutput {
    pub canvas: RgbaImage,
    pub used_gradient: bool,
    pub logo: Option<LogoPlacement>,
    pub elements: Vec<RenderedElement>,
    pub skipped: Vec<SkippedElement>,
    /// Overlay copy (headline, subhead), drawn in the palette text color.
    pub texts: Vec<RenderedText>,
    /// Button label, drawn on the button fill.
    pub cta: Option<RenderedText>,
    pub text_color: Rgb,
    /// 255 wherever overlay text or its stroke touched the canvas.
    pub ink: GrayImage,
}

struct RenderState<'a> {
    plan: &'a DesignPlan,
    tokens: &'a BrandTokens,
    grid: GridSpec,
    face: Option<&'static TextFace>,
    stroke_color: Rgb,
    output: CompositorOutput,
}

pub struct GridCompositor {
    fetcher: Arc<dyn AssetFetcher>,
}

impl GridCompositor {
    pub fn new(fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn render(
        &self,
        plan: &DesignPlan,
        tokens: &BrandTokens,
        template: &LayoutTemplate,
        background: Option<&DynamicImage>,
    ) -> CompositorOutput {
        let (width, height) = plan.aspect_ratio.canvas_size();
        let mut canvas = new_canvas(width, height, tokens.palette.background);

        let used_gradient = match background {
            Some(image) if image.width() > 0 && image.height() > 0 => {
                draw_background_image(&mut canvas, image);
                false
            }
            _ => {
                let (top, bottom) = tokens.palette.gradient_stops(plan.palette_mode);
                fill_vertical_gradient(&mut canvas, top, bottom);
                true
            }
        };

        let text_color = tokens.palette.text;
        let mut state = RenderState {
            plan,
            tokens,
            grid: GridSpec::new((width, height), &tokens.layout),
            face: embedded_face(),
            stroke_color: best_text_color_on(text_color),
            output: CompositorOutput {
                canvas,
                used_gradient,
                logo: None,
                elements: Vec::new(),
                skipped: Vec::new(),
                texts: Vec::new(),
                cta: None,
                text_color,
                ink: GrayImage::new(width, height),
            },
        };

        for slot in template.slots_in_z_order() {
            let region = state.grid.resolve(&slot.rect);
            if region.is_empty() {
                state.skip(slot, "slot resolves to an empty rectangle".to_string());
                continue;
            }
            match slot.slot_type {
                SlotType::Background => state.record(slot, region),
                SlotType::GradientOverlay => {
                    let opacity = slot.style.overlay_opacity.unwrap_or(DEFAULT_OVERLAY_OPACITY);
                    draw_scrim(&mut state.output.canvas, region, opacity);
                    state.record(slot, region);
                }
                SlotType::Text => state.draw_text_slot(slot, region),
                SlotType::Button => state.draw_button(slot, region),
                SlotType::Logo => self.draw_logo(&mut state, slot).await,
                SlotType::Product => self.draw_product(&mut state, slot, region).await,
            }
        }

        debug!(
            template = %template.id,
            drawn = state.output.elements.len(),
            skipped = state.output.skipped.len(),
            "composition rendered"
        );
        state.output
    }

    async fn draw_logo(&self, state: &mut RenderState<'_>, slot: &Slot) {
        let tokens = state.tokens;
        let logo = &tokens.logo;
        if logo.variants.is_empty() {
            state.skip(slot, "brand has no logo variants".to_string());
            return;
        }
        let anchor = state.plan.logo_position;
        match place_logo(&mut state.output.canvas, logo, anchor, self.fetcher.as_ref()).await {
            Ok(placement) => {
                state.record(slot, placement.rect());
                state.output.logo = Some(placement);
            }
            Err(e) => {
                warn!(slot = %slot.id, error = %e, "logo skipped");
                state.skip(slot, e.to_string());
            }
        }
    }

    async fn draw_product(&self, state: &mut RenderState<'_>, slot: &Slot, region: PixelRect) {
        let Some(url) = state.plan.product_image_url.clone() else {
            if state.plan.product_image_needed {
                state.skip(slot, "plan needs a product image but has no URL".to_string());
            }
            return;
        };
        match self.fetcher.fetch_image(&url).await {
            Ok(image) => {
                let covered = paste_fit(&mut state.output.canvas, &image, region);
                state.record(slot, covered);
            }
            Err(e) => {
                warn!(slot = %slot.id, url = %url, error = %e, "product image skipped");
                state.skip(slot, e.to_string());
            }
        }
    }
}

impl RenderState<'_> {
    fn record(&mut self, slot: &Slot, region: PixelRect) {
        self.output.elements.push(RenderedElement {
            slot_id: slot.id.clone(),
            kind: slot.slot_type,
            region,
        });
    }

    fn skip(&mut self, slot: &Slot, reason: String) {
        warn!(slot = %slot.id, kind = ?slot.slot_type, reason = %reason, "element skipped");
        self.output.skipped.push(SkippedElement {
            slot_id: slot.id.clone(),
            kind: slot.slot_type,
            reason,
        });
    }

    fn draw_text_slot(&mut self, slot: &Slot, region: PixelRect) {
        let plan = self.plan;
        let role = slot.style.text_role.unwrap_or(TextRole::Headline);
        let (field, text, default_px) = match role {
            TextRole::Headline => ("headline", plan.headline.as_str(), DEFAULT_HEADLINE_PX),
            TextRole::Subhead => ("subhead", plan.subhead.as_str(), DEFAULT_SUBHEAD_PX),
        };
        if text.trim().is_empty() {
            return;
        }
        let Some(face) = self.face else {
            self.skip(slot, "embedded font unavailable".to_string());
            return;
        };

        let mut size = slot.style.font_size_px.unwrap_or(default_px) as f32;
        let mut lines = wrap_text(face, text, region.width as f32, size);
        for _ in 0..MAX_SHRINK_PASSES {
            if block_height(face, lines.len(), size) <= region.height as f32 {
                break;
            }
            size *= SHRINK_FACTOR;
            lines = wrap_text(face, text, region.width as f32, size);
        }

        let style = TextStyle {
            size_px: size,
            fill: self.output.text_color,
            stroke: Some((self.stroke_color, ((size / 16.0).round() as u32).max(1))),
        };
        let line_height = face.line_height_px(size);
        let block = block_height(face, lines.len(), size);
        let mut y = region.y as f32 + ((region.height as f32 - block) / 2.0).max(0.0);
        let mut bounds = PixelRect::default();

        for line in &lines {
            let visible = line.trim();
            let x = aligned_x(slot.style.align, region, face.measure_px(visible, size));
            let painted = draw_text(
                &mut self.output.canvas,
                Some(&mut self.output.ink),
                face,
                visible,
                (x, y),
                &style,
            );
            bounds = bounds.union(&painted);
            y += line_height;
        }

        self.record(slot, bounds);
        self.output.texts.push(RenderedText {
            field,
            text: text.to_string(),
            size_px: size.round() as u32,
            region: bounds,
        });
    }

    fn draw_button(&mut self, slot: &Slot, region: PixelRect) {
        let plan = self.plan;
        let label = plan.cta_text.trim();
        if label.is_empty() {
            return;
        }
        let Some(face) = self.face else {
            self.skip(slot, "embedded font unavailable".to_string());
            return;
        };

        let fill = self.tokens.palette.mode_color(plan.palette_mode);
        let label_color = best_text_color_on(fill);

        let mut size = (region.height as f32 * 0.45).min(MAX_BUTTON_LABEL_PX).max(1.0);
        let mut padding = size;
        let available = region.width as f32 - 2.0 * padding;
        let label_width = face.measure_px(label, size);
        if label_width > available && available > 0.0 {
            size *= available / label_width;
            padding = size;
        }
        let label_width = face.measure_px(label, size);

        let button_width = ((label_width + 2.0 * padding).round() as u32).min(region.width);
        let button = PixelRect::new(
            region.x + (region.width - button_width) / 2,
            region.y,
            button_width,
            region.height,
        );
        fill_rounded_rect(
            &mut self.output.canvas,
            button,
            self.tokens.layout.corner_radius_px,
            fill,
        );

        // The layout box is one em tall; center that box on the button.
        let label_x = button.x as f32 + (button.width as f32 - label_width) / 2.0;
        let label_y = button.y as f32 + (button.height as f32 - size) / 2.0;
        let style = TextStyle {
            size_px: size,
            fill: label_color,
            stroke: None,
        };
        let painted = draw_text(
            &mut self.output.canvas,
            None,
            face,
            label,
            (label_x, label_y),
            &style,
        );

        self.record(slot, button);
        self.output.cta = Some(RenderedText {
            field: "cta",
            text: label.to_string(),
            size_px: size.round() as u32,
            region: painted,
        });
    }
}

fn block_height(face: &TextFace, lines: usize, size: f32) -> f32 {
    if lines == 0 {
        return 0.0;
    }
    // Last line needs only its em box, not full leading.
    (lines - 1) as f32 * face.line_height_px(size) + size
}

fn aligned_x(align: TextAlign, region: PixelRect, line_width: f32) -> f32 {
    let slack = (region.width as f32 - line_width).max(0.0);
    match align {
        TextAlign::Left => region.x as f32,
        TextAlign::Center => region.x as f32 + slack / 2.0,
        TextAlign::Right => region.x as f32 + slack,
    }
}
