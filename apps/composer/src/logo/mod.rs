//! Logo Placement Engine.
//!
//! Pure coordinate and luminance math plus one async entry point that
//! fetches the chosen variant and overlays it on the canvas.
//!
//! Placement is best-effort: a position that violates the safe zone is still
//! drawn, but `safe_zone_respected = false` is reported for the validator.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use serde::Serialize;
use tracing::{debug, warn};

use crate::assets::AssetFetcher;
use crate::color::contrast::region_luminance;
use crate::errors::AssetError;
use crate::models::{LogoAnchor, LogoAsset, LogoVariant, PixelRect};

/// Minimum side of the luminance sampling square.
pub const MIN_SAMPLE_SIZE: u32 = 100;
/// Below this the backdrop is dark enough for the light variant.
pub const DARK_BACKDROP: f64 = 0.3;
/// Above this the backdrop is bright enough for the dark variant.
pub const LIGHT_BACKDROP: f64 = 0.7;
/// Used when the backdrop cannot be sampled.
pub const NEUTRAL_LUMINANCE: f64 = 0.5;

const EDGE_TOLERANCE: f64 = 0.1;

/// Fall-through order after the preferred variant.
const FALLBACK_ORDER: [LogoVariant; 3] = [LogoVariant::FullColor, LogoVariant::Light, LogoVariant::Dark];

/// Audit record of where and how the logo was drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogoPlacement {
    pub variant_used: LogoVariant,
    pub anchor: LogoAnchor,
    pub luminance: f64,
    pub safe_zone_respected: bool,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub source_url: String,
}

impl LogoPlacement {
    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.x, self.y, self.width, self.height)
    }
}

/// Normalized (x, y) position of an anchor, 0 = left/top, 1 = right/bottom.
pub fn anchor_ratio(anchor: LogoAnchor) -> (f64, f64) {
    match anchor {
        LogoAnchor::TopLeft => (0.0, 0.0),
        LogoAnchor::TopRight => (1.0, 0.0),
        LogoAnchor::BottomLeft => (0.0, 1.0),
        LogoAnchor::BottomRight => (1.0, 1.0),
        LogoAnchor::TopCenter => (0.5, 0.0),
        LogoAnchor::BottomCenter => (0.5, 1.0),
        LogoAnchor::Center => (0.5, 0.5),
    }
}

/// Square sampling region centered on the anchor, clipped to the canvas.
pub fn sample_region(canvas: (u32, u32), anchor: LogoAnchor, safe_zone_px: u32) -> PixelRect {
    let (w, h) = canvas;
    let size = (2 * safe_zone_px).max(MIN_SAMPLE_SIZE);
    let (rx, ry) = anchor_ratio(anchor);
    let cx = (rx * w as f64).round() as i64;
    let cy = (ry * h as f64).round() as i64;
    let half = (size / 2) as i64;

    let x0 = (cx - half).clamp(0, w as i64);
    let y0 = (cy - half).clamp(0, h as i64);
    let x1 = (cx + half).clamp(0, w as i64);
    let y1 = (cy + half).clamp(0, h as i64);
    PixelRect::new(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32)
}

/// Mean WCAG relative luminance around the anchor, or `None` for an empty region.
pub fn sample_luminance(canvas: &RgbaImage, anchor: LogoAnchor, safe_zone_px: u32) -> Option<f64> {
    let region = sample_region(canvas.dimensions(), anchor, safe_zone_px);
    region_luminance(canvas, region)
}

pub fn preferred_variant(luminance: f64) -> LogoVariant {
    if luminance < DARK_BACKDROP {
        LogoVariant::Light
    } else if luminance > LIGHT_BACKDROP {
        LogoVariant::Dark
    } else {
        LogoVariant::FullColor
    }
}

/// Chooses a variant from `available`. Returns `None` only when `available` is empty.
pub fn select_variant(luminance: f64, available: &[LogoVariant]) -> Option<LogoVariant> {
    let preferred = preferred_variant(luminance);
    std::iter::once(preferred)
        .chain(FALLBACK_ORDER)
        .find(|v| available.contains(v))
}

/// Size after scaling to `min_width_px`, aspect preserved. Height is at least 1.
pub fn scaled_size(original: (u32, u32), min_width_px: u32) -> (u32, u32) {
    let (ow, oh) = original;
    if ow == 0 || oh == 0 {
        return (min_width_px.max(1), 1);
    }
    let width = min_width_px.max(1);
    let height = ((oh as f64) * (width as f64) / (ow as f64)).round().max(1.0) as u32;
    (width, height)
}

/// Top-left position for a logo of `size` at `anchor`.
///
/// Edge anchors are pinned `safe_zone_px` from the edge, mid anchors are
/// centered, then the result is clamped so the logo plus safe zone fits
/// (or to the canvas when it cannot).
pub fn compute_position(
    anchor: LogoAnchor,
    size: (u32, u32),
    canvas: (u32, u32),
    safe_zone_px: u32,
) -> (u32, u32) {
    let (rx, ry) = anchor_ratio(anchor);
    (
        axis_position(rx, size.0, canvas.0, safe_zone_px),
        axis_position(ry, size.1, canvas.1, safe_zone_px),
    )
}

fn axis_position(ratio: f64, length: u32, extent: u32, safe_zone: u32) -> u32 {
    let length = length as i64;
    let extent = extent as i64;
    let safe = safe_zone as i64;

    let raw = if ratio <= EDGE_TOLERANCE {
        safe
    } else if ratio >= 1.0 - EDGE_TOLERANCE {
        extent - length - safe
    } else {
        ((ratio * extent as f64) - length as f64 / 2.0).round() as i64
    };

    let max = extent - length - safe;
    let clamped = if max >= safe {
        raw.clamp(safe, max)
    } else {
        raw.clamp(0, (extent - length).max(0))
    };
    clamped.max(0) as u32
}

/// True when the logo keeps at least `safe_zone_px` from every canvas edge.
pub fn check_safe_zone(
    position: (u32, u32),
    size: (u32, u32),
    canvas: (u32, u32),
    safe_zone_px: u32,
) -> bool {
    let (x, y) = (position.0 as i64, position.1 as i64);
    let (w, h) = (size.0 as i64, size.1 as i64);
    let (cw, ch) = (canvas.0 as i64, canvas.1 as i64);
    let safe = safe_zone_px as i64;

    x >= safe && y >= safe && cw - (x + w) >= safe && ch - (y + h) >= safe
}

/// Samples, selects, fetches and draws the logo onto `canvas`.
pub async fn place_logo(
    canvas: &mut RgbaImage,
    logo: &LogoAsset,
    anchor: LogoAnchor,
    fetcher: &dyn AssetFetcher,
) -> Result<LogoPlacement, AssetError> {
    let luminance = match sample_luminance(canvas, anchor, logo.safe_zone_px) {
        Some(l) => l,
        None => {
            warn!(%anchor, "logo backdrop could not be sampled, assuming mid luminance");
            NEUTRAL_LUMINANCE
        }
    };

    let available = logo.available_variants();
    let variant = select_variant(luminance, &available)
        .ok_or_else(|| AssetError::Missing("logo variant".to_string()))?;
    let url = logo
        .variants
        .get(&variant)
        .cloned()
        .ok_or_else(|| AssetError::Missing(format!("logo variant {variant:?}")))?;

    let source = fetcher.fetch_image(&url).await?;
    let placement = overlay_logo(canvas, &source, logo, anchor, variant, luminance, url);
    debug!(
        variant = ?placement.variant_used,
        luminance = placement.luminance,
        x = placement.x,
        y = placement.y,
        safe_zone_respected = placement.safe_zone_respected,
        "logo placed"
    );
    Ok(placement)
}

fn overlay_logo(
    canvas: &mut RgbaImage,
    source: &DynamicImage,
    logo: &LogoAsset,
    anchor: LogoAnchor,
    variant: LogoVariant,
    luminance: f64,
    source_url: String,
) -> LogoPlacement {
    let canvas_size = canvas.dimensions();
    let (width, height) = scaled_size((source.width(), source.height()), logo.min_width_px);
    let scaled = imageops::resize(&source.to_rgba8(), width, height, FilterType::Lanczos3);
    let (x, y) = compute_position(anchor, (width, height), canvas_size, logo.safe_zone_px);
    imageops::overlay(canvas, &scaled, x as i64, y as i64);

    LogoPlacement {
        variant_used: variant,
        anchor,
        luminance,
        safe_zone_respected: check_safe_zone((x, y), (width, height), canvas_size, logo.safe_zone_px),
        x,
        y,
        width,
        height,
        source_url,
    }
}
