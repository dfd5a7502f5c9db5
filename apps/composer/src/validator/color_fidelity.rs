//! Color fidelity: how close the image's dominant colors sit to the brand palette.

use std::collections::HashMap;

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};

use crate::color::{delta_e_2000, Rgb};
use crate::models::{BrandPalette, SubScore};

/// Images are downscaled to this long side before bucket counting.
pub const ANALYSIS_MAX_DIMENSION: u32 = 256;
pub const MAX_DOMINANT_COLORS: usize = 5;

/// A dominant color and its share of the sampled pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DominantColor {
    pub color: Rgb,
    pub share: f64,
}

/// Up to `MAX_DOMINANT_COLORS` most frequent colors after quantizing each
/// channel to `levels` buckets. Ties break on bucket key so the result is
/// deterministic. Fully transparent pixels are ignored.
pub fn dominant_colors(image: &RgbaImage, levels: u32) -> Vec<DominantColor> {
    let levels = levels.clamp(2, 256);
    let bucket_width = 256 / levels;
    let sample = downscale(image);

    let mut counts: HashMap<(u8, u8, u8), u64> = HashMap::new();
    let mut total = 0u64;
    for pixel in sample.pixels() {
        if pixel[3] == 0 {
            continue;
        }
        let key = (
            bucket(pixel[0], bucket_width),
            bucket(pixel[1], bucket_width),
            bucket(pixel[2], bucket_width),
        );
        *counts.entry(key).or_insert(0) += 1;
        total += 1;
    }
    if total == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<((u8, u8, u8), u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(MAX_DOMINANT_COLORS)
        .map(|((r, g, b), count)| DominantColor {
            color: Rgb::new(
                bucket_center(r, bucket_width),
                bucket_center(g, bucket_width),
                bucket_center(b, bucket_width),
            ),
            share: count as f64 / total as f64,
        })
        .collect()
}

fn downscale(image: &RgbaImage) -> RgbaImage {
    let long_side = image.width().max(image.height());
    if long_side <= ANALYSIS_MAX_DIMENSION {
        return image.clone();
    }
    DynamicImage::ImageRgba8(image.clone())
        .resize(ANALYSIS_MAX_DIMENSION, ANALYSIS_MAX_DIMENSION, FilterType::Nearest)
        .to_rgba8()
}

fn bucket(value: u8, width: u32) -> u8 {
    (value as u32 / width) as u8
}

fn bucket_center(index: u8, width: u32) -> u8 {
    (index as u32 * width + width / 2).min(255) as u8
}

/// Piecewise mapping of mean ΔE to a 0–100 score.
pub fn delta_e_to_score(delta_e: f64) -> f64 {
    if delta_e < 5.0 {
        100.0
    } else if delta_e < 10.0 {
        90.0 - (delta_e - 5.0) / 5.0 * 20.0
    } else if delta_e < 20.0 {
        70.0 - (delta_e - 10.0) / 10.0 * 20.0
    } else {
        (50.0 - (delta_e - 20.0)).max(0.0)
    }
}

fn nearest_palette_distance(color: Rgb, palette: &BrandPalette) -> (f64, Rgb) {
    palette
        .colors()
        .into_iter()
        .map(|p| (delta_e_2000(color, p), p))
        .fold((f64::INFINITY, palette.primary), |best, candidate| {
            if candidate.0 < best.0 {
                candidate
            } else {
                best
            }
        })
}

pub fn score_color_fidelity(
    image: &RgbaImage,
    palette: &BrandPalette,
    levels: u32,
    weight: f64,
) -> SubScore {
    let dominant = dominant_colors(image, levels);
    if dominant.is_empty() {
        return SubScore::unavailable(weight, "no opaque pixels to sample");
    }

    let mut findings = Vec::new();
    let mut total = 0.0;
    for d in &dominant {
        let (distance, nearest) = nearest_palette_distance(d.color, palette);
        total += distance;
        if distance >= 10.0 && d.share >= 0.1 {
            findings.push(format!(
                "Dominant color {} ({:.0}% of image) is off-palette (ΔE {:.1} from {})",
                d.color,
                d.share * 100.0,
                distance,
                nearest
            ));
        }
    }
    let mean = total / dominant.len() as f64;
    let score = delta_e_to_score(mean);
    findings.insert(0, format!("Mean ΔE to brand palette: {mean:.1}"));
    SubScore::new(score, weight, findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn palette() -> BrandPalette {
        BrandPalette {
            primary: Rgb::new(0xE6, 0x39, 0x46),
            secondary: Rgb::new(0x1D, 0x35, 0x57),
            accent: Rgb::new(0xF1, 0xC4, 0x0F),
            text: Rgb::WHITE,
            background: Rgb::BLACK,
            min_contrast: 4.5,
        }
    }

    #[test]
    fn test_breakpoints() {
        assert_eq!(delta_e_to_score(0.0), 100.0);
        assert_eq!(delta_e_to_score(4.99), 100.0);
        assert_eq!(delta_e_to_score(5.0), 90.0);
        assert!((delta_e_to_score(7.5) - 80.0).abs() < 1e-9);
        assert_eq!(delta_e_to_score(10.0), 70.0);
        assert!((delta_e_to_score(15.0) - 60.0).abs() < 1e-9);
        assert_eq!(delta_e_to_score(20.0), 50.0);
        assert_eq!(delta_e_to_score(45.0), 25.0);
        assert_eq!(delta_e_to_score(90.0), 0.0);
    }

    #[test]
    fn test_dominant_colors_orders_by_frequency() {
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([250, 250, 250, 255]));
        for x in 0..3 {
            img.put_pixel(x, 0, Rgba([5, 5, 5, 255]));
        }
        let dominant = dominant_colors(&img, 32);
        assert_eq!(dominant.len(), 2);
        assert_eq!(dominant[0].color, Rgb::new(252, 252, 252));
        assert!((dominant[0].share - 0.97).abs() < 1e-9);
        assert_eq!(dominant[1].color, Rgb::new(4, 4, 4));
    }

    #[test]
    fn test_dominant_colors_caps_at_five() {
        let mut img = RgbaImage::new(8, 1);
        for x in 0..8 {
            img.put_pixel(x, 0, Rgba([(x * 30) as u8, 0, 0, 255]));
        }
        assert_eq!(dominant_colors(&img, 32).len(), MAX_DOMINANT_COLORS);
    }

    #[test]
    fn test_on_palette_image_scores_high() {
        let img = RgbaImage::from_pixel(64, 64, palette().primary.to_rgba(255));
        let sub = score_color_fidelity(&img, &palette(), 32, 0.4);
        assert!(sub.score >= 90.0, "{sub:?}");
        assert!(sub.available);
    }

    #[test]
    fn test_off_palette_image_scores_lower_and_explains() {
        let img = RgbaImage::from_pixel(64, 64, Rgba([40, 200, 60, 255]));
        let sub = score_color_fidelity(&img, &palette(), 32, 0.4);
        assert!(sub.score < 70.0, "{sub:?}");
        assert!(sub.findings.iter().any(|f| f.contains("off-palette")));
    }

    #[test]
    fn test_transparent_image_is_unavailable() {
        let img = RgbaImage::new(4, 4);
        let sub = score_color_fidelity(&img, &palette(), 32, 0.4);
        assert!(!sub.available);
        assert_eq!(sub.score, 100.0);
    }
}
