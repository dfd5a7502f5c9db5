use serde::Serialize;

use super::catalog::DensityClass;
use crate::models::DesignPlan;

/// Word count at which copy is considered maximally dense.
pub const WORD_CEILING: f64 = 30.0;

const COMPLEX_SCENE_KEYWORDS: &[&str] = &[
    "scene", "landscape", "crowd", "detailed", "busy", "city", "people",
];

/// Inputs to the density classification, kept for audit output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContentDensity {
    /// Total copy words over `WORD_CEILING`, capped at 1.
    pub ratio: f64,
    pub has_product: bool,
    pub complex_scene: bool,
    pub class: DensityClass,
}

pub fn analyze_density(plan: &DesignPlan) -> ContentDensity {
    let ratio = (plan.word_count() as f64 / WORD_CEILING).min(1.0);
    let has_product = plan.product_image_needed;
    let complex_scene = is_complex_scene(&plan.visual_concept);
    ContentDensity {
        ratio,
        has_product,
        complex_scene,
        class: classify(ratio, has_product, complex_scene),
    }
}

/// Visual weight wins while copy is short; long copy always reads text-heavy.
pub fn classify(ratio: f64, has_product: bool, complex_scene: bool) -> DensityClass {
    if (has_product || complex_scene) && ratio < 0.5 {
        DensityClass::ImageHeavy
    } else if ratio >= 0.6 {
        DensityClass::TextHeavy
    } else if ratio < 0.25 {
        DensityClass::ImageHeavy
    } else {
        DensityClass::Balanced
    }
}

fn is_complex_scene(visual_concept: &str) -> bool {
    let lower = visual_concept.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| COMPLEX_SCENE_KEYWORDS.contains(&word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(classify(0.1, false, false), DensityClass::ImageHeavy);
        assert_eq!(classify(0.3, false, false), DensityClass::Balanced);
        assert_eq!(classify(0.59, false, false), DensityClass::Balanced);
        assert_eq!(classify(0.6, false, false), DensityClass::TextHeavy);
    }

    #[test]
    fn test_product_or_scene_pulls_short_copy_to_image_heavy() {
        assert_eq!(classify(0.4, true, false), DensityClass::ImageHeavy);
        assert_eq!(classify(0.4, false, true), DensityClass::ImageHeavy);
        assert_eq!(classify(0.7, true, true), DensityClass::TextHeavy);
    }

    #[test]
    fn test_complex_scene_matches_whole_words() {
        assert!(is_complex_scene("A busy City street at dusk"));
        assert!(is_complex_scene("crowd, cheering"));
        assert!(!is_complex_scene("minimal gradient with soft peopleless light"));
    }
}
