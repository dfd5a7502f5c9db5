//! WCAG 2.x relative luminance and contrast ratio.

use image::{GrayImage, RgbaImage};

use crate::color::Rgb;
use crate::models::PixelRect;

/// Normal-size text requirement (WCAG AA).
pub const WCAG_AA_NORMAL: f64 = 4.5;
/// Large text requirement (WCAG AA).
pub const WCAG_AA_LARGE: f64 = 3.0;

/// sRGB channel (0–255) to linear light, per the WCAG definition.
pub fn srgb_to_linear(channel: u8) -> f64 {
    let c = channel as f64 / 255.0;
    if c <= 0.03928 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Relative luminance in 0.0 (black) ..= 1.0 (white).
pub fn relative_luminance(color: Rgb) -> f64 {
    0.2126 * srgb_to_linear(color.r)
        + 0.7152 * srgb_to_linear(color.g)
        + 0.0722 * srgb_to_linear(color.b)
}

/// `(L_light + 0.05) / (L_dark + 0.05)`; argument order does not matter.
pub fn contrast_ratio_from_luminance(l1: f64, l2: f64) -> f64 {
    let (light, dark) = if l1 >= l2 { (l1, l2) } else { (l2, l1) };
    (light + 0.05) / (dark + 0.05)
}

pub fn contrast_ratio(a: Rgb, b: Rgb) -> f64 {
    contrast_ratio_from_luminance(relative_luminance(a), relative_luminance(b))
}

/// Black or white, whichever reads better on `background`.
pub fn best_text_color_on(background: Rgb) -> Rgb {
    if contrast_ratio(Rgb::WHITE, background) >= contrast_ratio(Rgb::BLACK, background) {
        Rgb::WHITE
    } else {
        Rgb::BLACK
    }
}

/// Mean relative luminance over `region` (clamped to the image).
///
/// Returns `None` when the clamped region is empty.
pub fn region_luminance(image: &RgbaImage, region: PixelRect) -> Option<f64> {
    region_luminance_masked(image, region, None)
}

/// Mean relative luminance over `region`, skipping every pixel the `mask`
/// marks as nonzero.
///
/// Returns `None` when the clamped region is empty or fully masked.
pub fn region_luminance_masked(
    image: &RgbaImage,
    region: PixelRect,
    mask: Option<&GrayImage>,
) -> Option<f64> {
    let region = region.clamp_to(image.width(), image.height());
    if region.is_empty() {
        return None;
    }

    let masked = |x: u32, y: u32| {
        mask.is_some_and(|m| x < m.width() && y < m.height() && m.get_pixel(x, y)[0] > 0)
    };
    let mut sum = 0.0_f64;
    let mut count = 0u64;
    for y in region.y..region.bottom() {
        for x in region.x..region.right() {
            if masked(x, y) {
                continue;
            }
            sum += relative_luminance(Rgb::from_pixel(image.get_pixel(x, y)));
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f64)
}
