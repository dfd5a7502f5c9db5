//! Text face: an embedded TrueType font, shaped and rasterized with `ab_glyph`.
//!
//! Wrapping, alignment and drawing all take their advances from the same face,
//! so a measured line is exactly as wide as the painted one.

use std::sync::OnceLock;

use ab_glyph::{point, Font, FontRef, Glyph, GlyphId, InvalidFont, PxScale, ScaleFont};
use tracing::error;

static EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// Baseline-to-baseline distance relative to font size.
const LINE_SPACING: f32 = 1.15;

pub struct TextFace {
    font: FontRef<'static>,
}

impl TextFace {
    pub fn from_bytes(bytes: &'static [u8]) -> Result<Self, InvalidFont> {
        Ok(Self {
            font: FontRef::try_from_slice(bytes)?,
        })
    }

    pub fn font(&self) -> &FontRef<'static> {
        &self.font
    }

    /// Advance width of `text` in pixels at `size_px`, kerning included.
    pub fn measure_px(&self, text: &str, size_px: f32) -> f32 {
        self.layout_line(text, size_px, 0.0, 0.0).1
    }

    /// Positions every glyph of one line whose box has its top-left at
    /// (`x`, `y`). Returns the glyphs and the total advance.
    pub fn layout_line(&self, text: &str, size_px: f32, x: f32, y: f32) -> (Vec<Glyph>, f32) {
        let scale = PxScale::from(size_px.max(1.0));
        let scaled = self.font.as_scaled(scale);
        let baseline = y + scaled.ascent();

        let mut glyphs = Vec::with_capacity(text.len());
        let mut caret = 0.0_f32;
        let mut previous: Option<GlyphId> = None;
        for c in text.chars().filter(|c| !c.is_control()) {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            glyphs.push(id.with_scale_and_position(scale, point(x + caret, baseline)));
            caret += scaled.h_advance(id);
            previous = Some(id);
        }
        (glyphs, caret)
    }

    /// True when the face has a real glyph (not `.notdef`) for `c`.
    pub fn covers(&self, c: char) -> bool {
        self.font.glyph_id(c).0 != 0
    }

    /// Pixel height of one text line at `size_px`, including leading.
    pub fn line_height_px(&self, size_px: f32) -> f32 {
        size_px * LINE_SPACING
    }
}

/// The face every composition draws with. Parsed once on first use.
///
/// `None` only if the embedded font bytes are unreadable; callers skip text
/// in that case.
pub fn embedded_face() -> Option<&'static TextFace> {
    static FACE: OnceLock<Option<TextFace>> = OnceLock::new();
    FACE.get_or_init(|| match TextFace::from_bytes(EMBEDDED_FONT) {
        Ok(face) => Some(face),
        Err(e) => {
            error!(error = ?e, "embedded font could not be parsed; text will be skipped");
            None
        }
    })
    .as_ref()
}
