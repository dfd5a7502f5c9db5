//! End-to-end composition through the public engine API.

use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use composer::assets::encode_png_data_url;
use composer::gate::{AttemptOutcome, DetectedToken, DetectorError};
use composer::{
    AspectRatio, AssetError, BackgroundGenerator, BackgroundSource, BrandTokens, ComposeError,
    CompositionEngine, DesignPlan, EngineConfig, LogoAnchor, LogoVariant, PaletteMode, TextCheck,
    TextDetector,
};
use image::{DynamicImage, Rgba, RgbaImage};

const TOKENS_JSON: &str = r##"{
    "name": "Acme",
    "colors": {
        "primary": "#E63946",
        "secondary": "#1D3557",
        "accent": "#F1C40F",
        "text": "#FFFFFF",
        "background": "#000000"
    },
    "logo": {"allowed_positions": ["TL", "TR", "BL", "BR"]},
    "cta_whitelist": ["Shop Now", "Learn More"],
    "forbidden_terms": ["cheap", "guaranteed"]
}"##;

fn load_tokens() -> BrandTokens {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TOKENS_JSON.as_bytes()).unwrap();
    BrandTokens::from_path(file.path()).unwrap()
}

fn summer_sale_plan() -> DesignPlan {
    DesignPlan {
        headline: "Summer Sale".to_string(),
        subhead: "50% off everything this week".to_string(),
        cta_text: "Shop Now".to_string(),
        visual_concept: "warm gradient".to_string(),
        channel: "instagram".to_string(),
        aspect_ratio: AspectRatio::Square,
        palette_mode: PaletteMode::Primary,
        logo_position: LogoAnchor::TopRight,
        product_image_needed: false,
        product_image_url: None,
    }
}

fn solid(v: u8) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 64, Rgba([v, v, v, 255])))
}

/// Reports text for every image whose top-left pixel is pure white.
struct WhiteMeansText;

#[async_trait]
impl TextDetector for WhiteMeansText {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectedToken>, DetectorError> {
        let px = image.to_rgba8().get_pixel(0, 0).0;
        if px[0] == 255 {
            Ok(vec![DetectedToken {
                text: "SALE".to_string(),
                confidence: 92.0,
            }])
        } else {
            Ok(vec![])
        }
    }
}

/// Produces white (text-bearing) images until `clean_on`, then a dark one.
struct SequencedGenerator {
    clean_on: u32,
    calls: AtomicU32,
}

impl SequencedGenerator {
    fn new(clean_on: u32) -> Self {
        Self {
            clean_on,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl BackgroundGenerator for SequencedGenerator {
    async fn generate(&self, attempt: u32, _previous: Option<&TextCheck>) -> Result<DynamicImage, AssetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(if attempt >= self.clean_on { solid(20) } else { solid(255) })
    }
}

fn engine_with(detector: Arc<dyn TextDetector>) -> CompositionEngine {
    CompositionEngine::builder(load_tokens())
        .config(EngineConfig::default())
        .detector(detector)
        .build()
}

#[tokio::test]
async fn test_gradient_composition_is_on_brand() {
    let engine = engine_with(Arc::new(WhiteMeansText));
    let tokens = engine.tokens().clone();
    let result = engine
        .compose(&summer_sale_plan(), BackgroundSource::None)
        .await
        .unwrap();

    assert_eq!(result.image.dimensions(), (1080, 1080));
    assert!(result.used_gradient);
    let corner = result.image.get_pixel(0, 0);
    assert_eq!(corner.0[..3], tokens.palette.primary.to_rgba(255).0[..3]);

    let button = result
        .elements
        .iter()
        .find(|e| e.slot_id == "cta")
        .expect("button drawn")
        .region;
    let top_edge = result.image.get_pixel(button.x + button.width / 2, button.y + 2);
    assert_eq!(top_edge.0[..3], tokens.palette.primary.to_rgba(255).0[..3]);

    let report = &result.report;
    assert!((0.0..=100.0).contains(&report.overall_score));
    assert_eq!(report.sub_scores().len(), 3);
    assert_eq!(report.policy.score, 100.0);
    assert!(result.skipped.iter().any(|s| s.reason.contains("no logo")));
}

#[tokio::test]
async fn test_forbidden_term_is_reported_not_fatal() {
    let mut plan = summer_sale_plan();
    plan.subhead = "Cheap prices all week".to_string();
    let result = engine_with(Arc::new(WhiteMeansText))
        .compose(&plan, BackgroundSource::None)
        .await
        .unwrap();

    assert!(result.report.policy.score <= 90.0);
    assert!(result
        .report
        .policy
        .findings
        .iter()
        .any(|f| f.to_lowercase().contains("cheap")));
    assert!(!result.report.suggestions.is_empty());
}

#[tokio::test]
async fn test_forbidden_term_in_headline_is_flagged() {
    let mut plan = summer_sale_plan();
    plan.headline = "Cheap Summer Sale".to_string();
    let result = engine_with(Arc::new(WhiteMeansText))
        .compose(&plan, BackgroundSource::None)
        .await
        .unwrap();

    let policy = &result.report.policy;
    assert!(policy.score <= 90.0, "{policy:?}");
    assert!(policy
        .findings
        .iter()
        .any(|f| f.to_lowercase().contains("cheap") && f.contains("headline")));
    assert!(result.report.reasons.iter().any(|r| r.contains("forbidden")));
}

#[tokio::test]
async fn test_oversized_logo_breaks_safe_zone_and_costs_policy() {
    let mut tokens = load_tokens();
    tokens.logo.min_width_px = 1060;
    let light = DynamicImage::ImageRgba8(RgbaImage::from_pixel(80, 40, Rgba([250, 250, 250, 255])));
    tokens
        .logo
        .variants
        .insert(LogoVariant::Light, encode_png_data_url(&light).unwrap());
    let safe_zone = tokens.logo.safe_zone_px;

    let engine = CompositionEngine::from_config(tokens, EngineConfig::default());
    let result = engine
        .compose(&summer_sale_plan(), BackgroundSource::None)
        .await
        .unwrap();

    let logo = result.logo.as_ref().expect("logo placed");
    assert_eq!(logo.width, 1060);
    assert!(!logo.safe_zone_respected);

    let policy = &result.report.policy;
    assert_eq!(policy.score, 90.0);
    assert_eq!(
        policy.findings,
        vec![format!("Logo placement breaks the {safe_zone}px safe zone")]
    );
    assert!(result.report.reasons.iter().any(|r| r.contains("safe zone")));
}

#[tokio::test]
async fn test_dark_background_gets_light_logo() {
    let mut tokens = load_tokens();
    let light = DynamicImage::ImageRgba8(RgbaImage::from_pixel(80, 40, Rgba([250, 250, 250, 255])));
    let dark = DynamicImage::ImageRgba8(RgbaImage::from_pixel(80, 40, Rgba([10, 10, 10, 255])));
    tokens
        .logo
        .variants
        .insert(LogoVariant::Light, encode_png_data_url(&light).unwrap());
    tokens
        .logo
        .variants
        .insert(LogoVariant::Dark, encode_png_data_url(&dark).unwrap());

    let engine = CompositionEngine::from_config(tokens, EngineConfig::default());
    let background = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1080, 1080, Rgba([8, 8, 12, 255])));
    let result = engine
        .compose(&summer_sale_plan(), BackgroundSource::Image(background))
        .await
        .unwrap();

    let logo = result.logo.expect("logo placed");
    assert_eq!(logo.variant_used, LogoVariant::Light);
    assert!(logo.luminance < 0.3);
    assert!(logo.safe_zone_respected);
    assert!(!result.used_gradient);
}

#[tokio::test(start_paused = true)]
async fn test_gate_retries_until_clean_background() {
    let generator = SequencedGenerator::new(2);
    let result = engine_with(Arc::new(WhiteMeansText))
        .compose(&summer_sale_plan(), BackgroundSource::Generated(&generator))
        .await
        .unwrap();

    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.gate_attempts.len(), 2);
    assert_eq!(result.gate_attempts[0].outcome, AttemptOutcome::TextDetected);
    assert_eq!(result.gate_attempts[0].detected_text, "SALE");
    assert_eq!(result.gate_attempts[1].outcome, AttemptOutcome::Accepted);
    assert!(!result.gate_fallback);
    assert!(!result.used_gradient);
}

#[tokio::test(start_paused = true)]
async fn test_gate_exhaustion_falls_back_to_gradient() {
    let generator = SequencedGenerator::new(u32::MAX);
    let result = engine_with(Arc::new(WhiteMeansText))
        .compose(&summer_sale_plan(), BackgroundSource::Generated(&generator))
        .await
        .unwrap();

    assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    assert!(result.gate_fallback);
    assert!(result.used_gradient);
    assert!(result
        .gate_attempts
        .iter()
        .all(|a| a.outcome == AttemptOutcome::TextDetected));
}

#[tokio::test]
async fn test_plan_violations_are_all_reported() {
    let mut plan = summer_sale_plan();
    plan.headline = String::new();
    plan.cta_text = "Buy Buy Buy".to_string();
    plan.logo_position = LogoAnchor::Center;
    let err = engine_with(Arc::new(WhiteMeansText))
        .compose(&plan, BackgroundSource::None)
        .await
        .unwrap_err();

    match err {
        ComposeError::InvalidPlan(violations) => assert_eq!(violations.len(), 3),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_malformed_background_data_url_is_fatal() {
    let err = engine_with(Arc::new(WhiteMeansText))
        .compose(
            &summer_sale_plan(),
            BackgroundSource::Url("data:image/png;base64,not-an-image".to_string()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ComposeError::RequiredAsset(_)), "{err}");
}

#[tokio::test]
async fn test_every_aspect_ratio_renders_at_its_canvas_size() {
    let engine = engine_with(Arc::new(WhiteMeansText));
    for ratio in AspectRatio::ALL {
        let mut plan = summer_sale_plan();
        plan.aspect_ratio = ratio;
        let result = engine.compose(&plan, BackgroundSource::None).await.unwrap();
        assert_eq!(result.image.dimensions(), ratio.canvas_size(), "{ratio}");
        assert!(!result.template_id.is_empty());
    }
}

#[tokio::test]
async fn test_concurrent_requests_share_one_engine() {
    let engine = Arc::new(engine_with(Arc::new(WhiteMeansText)));
    let mut handles = Vec::new();
    for ratio in [AspectRatio::Square, AspectRatio::Story, AspectRatio::Landscape] {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut plan = summer_sale_plan();
            plan.aspect_ratio = ratio;
            engine.compose(&plan, BackgroundSource::None).await.map(|r| r.request_id)
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}
