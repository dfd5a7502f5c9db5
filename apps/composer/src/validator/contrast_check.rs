use image::{GrayImage, RgbaImage};

use crate::color::contrast::{contrast_ratio_from_luminance, region_luminance_masked, relative_luminance};
use crate::color::Rgb;
use crate::models::{PixelRect, SubScore};

use super::ComplianceThresholds;

/// At most this many regions are sampled.
pub const MAX_SAMPLE_REGIONS: usize = 3;

/// Regions to sample: the rendered text boxes, or fixed top/middle/bottom
/// bands when none were recorded.
pub fn sample_regions(image: &RgbaImage, text_regions: &[PixelRect]) -> Vec<PixelRect> {
    let recorded: Vec<PixelRect> = text_regions
        .iter()
        .filter(|r| !r.is_empty())
        .take(MAX_SAMPLE_REGIONS)
        .copied()
        .collect();
    if !recorded.is_empty() {
        return recorded;
    }

    let (w, h) = image.dimensions();
    let band = (h / 5).max(1);
    [h / 10, h / 2 - band / 2, h - h / 10 - band]
        .into_iter()
        .map(|y| PixelRect::new(0, y, w, band).clamp_to(w, h))
        .filter(|r| !r.is_empty())
        .collect()
}

pub fn score_from_ratio(average: f64, required: f64, large: f64) -> f64 {
    if average >= required {
        100.0
    } else if average >= large {
        80.0
    } else {
        80.0 * average / large
    }
}

/// Scores text legibility against the pixels behind it.
///
/// `required` is the brand's minimum contrast (normally 4.5:1). With no text
/// on the canvas the score is 100. Pixels marked in `ink_mask` are glyph or
/// stroke pixels and never count as background.
pub fn score_contrast(
    image: &RgbaImage,
    text_color: Rgb,
    ink_mask: Option<&GrayImage>,
    text_regions: &[PixelRect],
    has_text: bool,
    required: f64,
    thresholds: &ComplianceThresholds,
) -> SubScore {
    let weight = thresholds.contrast_weight;
    if !has_text {
        return SubScore::new(100.0, weight, vec!["No overlay text; contrast not applicable".to_string()]);
    }

    let text_luminance = relative_luminance(text_color);
    let ratios: Vec<f64> = sample_regions(image, text_regions)
        .into_iter()
        .filter_map(|region| region_luminance_masked(image, region, ink_mask))
        .map(|bg| contrast_ratio_from_luminance(text_luminance, bg))
        .collect();

    if ratios.is_empty() {
        return SubScore::unavailable(weight, "no background regions could be sampled");
    }

    let average = ratios.iter().sum::<f64>() / ratios.len() as f64;
    let score = score_from_ratio(average, required, thresholds.contrast_large);
    let mut findings = vec![format!(
        "Average text contrast {average:.2}:1 over {} region(s) (required {required:.1}:1)",
        ratios.len()
    )];
    if average < required {
        findings.push(format!(
            "Text color {text_color} falls below {required:.1}:1 against its background"
        ));
    }
    SubScore::new(score, weight, findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn thresholds() -> ComplianceThresholds {
        ComplianceThresholds::default()
    }

    #[test]
    fn test_score_from_ratio_bands() {
        assert_eq!(score_from_ratio(7.0, 4.5, 3.0), 100.0);
        assert_eq!(score_from_ratio(4.5, 4.5, 3.0), 100.0);
        assert_eq!(score_from_ratio(3.2, 4.5, 3.0), 80.0);
        assert!((score_from_ratio(1.5, 4.5, 3.0) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_text_scores_full() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        let sub = score_contrast(&img, Rgb::WHITE, None, &[], false, 4.5, &thresholds());
        assert_eq!(sub.score, 100.0);
    }

    #[test]
    fn test_white_on_black_scores_full() {
        let img = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        let sub = score_contrast(&img, Rgb::WHITE, None, &[], true, 4.5, &thresholds());
        assert_eq!(sub.score, 100.0);
        assert!(sub.findings[0].contains("21.00:1"), "{:?}", sub.findings);
    }

    #[test]
    fn test_white_on_white_scores_low() {
        let img = RgbaImage::from_pixel(100, 100, Rgba([250, 250, 250, 255]));
        let region = [PixelRect::new(10, 10, 50, 20)];
        let sub = score_contrast(&img, Rgb::WHITE, None, &region, true, 4.5, &thresholds());
        assert!(sub.score < 40.0, "{sub:?}");
        assert_eq!(sub.findings.len(), 2);
    }

    #[test]
    fn test_glyph_pixels_are_excluded_from_background() {
        // Dark background with white glyph pixels inside the text box.
        let mut img = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        let mut ink = GrayImage::new(100, 100);
        for x in 10..60 {
            img.put_pixel(x, 15, Rgba([255, 255, 255, 255]));
            ink.put_pixel(x, 15, image::Luma([255]));
        }
        let region = [PixelRect::new(10, 10, 50, 20)];
        let sub = score_contrast(&img, Rgb::WHITE, Some(&ink), &region, true, 4.5, &thresholds());
        assert!(sub.findings[0].contains("21.00:1"), "{:?}", sub.findings);
    }

    #[test]
    fn test_dark_background_matching_stroke_color_still_counts() {
        use crate::render::canvas::{draw_text, new_canvas, TextStyle};
        use crate::render::embedded_face;

        // Near-black background: the black stroke is close to it in color,
        // but only pixels the stroke actually touched are left out.
        let background = Rgb::new(12, 12, 12);
        let mut canvas = new_canvas(600, 120, background);
        let mut ink = GrayImage::new(600, 120);
        let style = TextStyle {
            size_px: 64.0,
            fill: Rgb::WHITE,
            stroke: Some((Rgb::BLACK, 3)),
        };
        let face = embedded_face().expect("embedded font parses");
        let painted = draw_text(&mut canvas, Some(&mut ink), face, "SUMMER SALE", (20.0, 20.0), &style);
        assert!(!painted.is_empty());

        let sub = score_contrast(&canvas, Rgb::WHITE, Some(&ink), &[painted], true, 4.5, &thresholds());
        let expected = contrast_ratio_from_luminance(1.0, relative_luminance(background));
        assert!(expected > 19.0);
        assert!(
            sub.findings[0].contains(&format!("{expected:.2}:1")),
            "{:?}",
            sub.findings
        );
        assert_eq!(sub.score, 100.0);
    }

    #[test]
    fn test_fully_inked_regions_are_unavailable() {
        let img = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]));
        let ink = GrayImage::from_pixel(20, 20, image::Luma([255]));
        let region = [PixelRect::new(0, 0, 20, 20)];
        let sub = score_contrast(&img, Rgb::WHITE, Some(&ink), &region, true, 4.5, &thresholds());
        assert!(!sub.available);
    }

    #[test]
    fn test_fallback_bands_are_inside_image() {
        let img = RgbaImage::new(1080, 1920);
        let bands = sample_regions(&img, &[]);
        assert_eq!(bands.len(), 3);
        for band in bands {
            assert!(band.bottom() <= 1920);
        }
    }
}
