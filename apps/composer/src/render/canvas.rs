//! Raster primitives used by the compositor.

use ab_glyph::Font;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};

use super::font::TextFace;
use crate::color::Rgb;
use crate::models::PixelRect;

pub fn new_canvas(width: u32, height: u32, fill: Rgb) -> RgbaImage {
    RgbaImage::from_pixel(width, height, fill.to_rgba(255))
}

/// Top-to-bottom two-stop linear gradient over the whole canvas.
/// Row 0 is exactly `top`; the last row is exactly `bottom`.
pub fn fill_vertical_gradient(canvas: &mut RgbaImage, top: Rgb, bottom: Rgb) {
    let height = canvas.height();
    let span = height.saturating_sub(1).max(1) as f64;
    for y in 0..height {
        let color = top.lerp(bottom, y as f64 / span).to_rgba(255);
        for x in 0..canvas.width() {
            canvas.put_pixel(x, y, color);
        }
    }
}

/// Scales `source` to cover the canvas, cropping the overflow.
pub fn draw_background_image(canvas: &mut RgbaImage, source: &DynamicImage) {
    let (w, h) = canvas.dimensions();
    let filled = source.resize_to_fill(w, h, FilterType::Triangle).to_rgba8();
    imageops::replace(canvas, &filled, 0, 0);
}

/// Source-over blend of `color` at `alpha` (0–1) onto one pixel.
pub fn blend_pixel(canvas: &mut RgbaImage, x: u32, y: u32, color: Rgb, alpha: f32) {
    if x >= canvas.width() || y >= canvas.height() {
        return;
    }
    let alpha = alpha.clamp(0.0, 1.0);
    let dst = canvas.get_pixel_mut(x, y);
    let mix = |src: u8, under: u8| -> u8 {
        (src as f32 * alpha + under as f32 * (1.0 - alpha)).round() as u8
    };
    *dst = Rgba([
        mix(color.r, dst[0]),
        mix(color.g, dst[1]),
        mix(color.b, dst[2]),
        255,
    ]);
}

/// Vertical scrim: transparent at the top of `rect`, `max_alpha` black at the bottom.
pub fn draw_scrim(canvas: &mut RgbaImage, rect: PixelRect, max_alpha: f32) {
    let rect = rect.clamp_to(canvas.width(), canvas.height());
    if rect.is_empty() {
        return;
    }
    let span = rect.height.saturating_sub(1).max(1) as f32;
    for dy in 0..rect.height {
        let alpha = max_alpha * dy as f32 / span;
        for dx in 0..rect.width {
            blend_pixel(canvas, rect.x + dx, rect.y + dy, Rgb::BLACK, alpha);
        }
    }
}

/// Opaque filled rectangle with rounded corners. `radius` is capped at half
/// the shorter side.
pub fn fill_rounded_rect(canvas: &mut RgbaImage, rect: PixelRect, radius: u32, color: Rgb) {
    let rect = rect.clamp_to(canvas.width(), canvas.height());
    if rect.is_empty() {
        return;
    }
    let r = radius.min(rect.width / 2).min(rect.height / 2) as f64;
    let fill = color.to_rgba(255);
    let (left, top) = (rect.x as f64, rect.y as f64);
    let (right, bottom) = (rect.right() as f64, rect.bottom() as f64);

    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            let px = x as f64 + 0.5;
            let py = y as f64 + 0.5;
            let cx = px.clamp(left + r, right - r);
            let cy = py.clamp(top + r, bottom - r);
            let (dx, dy) = (px - cx, py - cy);
            if dx * dx + dy * dy <= r * r {
                canvas.put_pixel(x, y, fill);
            }
        }
    }
}

/// How one line of text is painted.
#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    pub size_px: f32,
    pub fill: Rgb,
    /// Outline color and width in pixels, painted under the fill.
    pub stroke: Option<(Rgb, u32)>,
}

/// Per-pixel coverage (0–1) of a rasterized line, anchored at `origin`.
struct Coverage {
    origin: (i64, i64),
    width: usize,
    height: usize,
    cells: Vec<f32>,
}

impl Coverage {
    fn new(origin: (i64, i64), width: usize, height: usize) -> Self {
        Self {
            origin,
            width,
            height,
            cells: vec![0.0; width * height],
        }
    }

    fn raise(&mut self, x: usize, y: usize, value: f32) {
        if x < self.width && y < self.height {
            let cell = &mut self.cells[y * self.width + x];
            *cell = cell.max(value.clamp(0.0, 1.0));
        }
    }

    /// Grows the coverage by a disk of radius `radius`.
    fn dilated(&self, radius: u32) -> Coverage {
        let r = radius as i64;
        let offsets: Vec<(i64, i64)> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| dx * dx + dy * dy <= r * r)
            .collect();
        let mut out = Coverage::new(self.origin, self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let value = self.cells[y * self.width + x];
                if value <= 0.0 {
                    continue;
                }
                for (dx, dy) in &offsets {
                    let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                    if nx >= 0 && ny >= 0 {
                        out.raise(nx as usize, ny as usize, value);
                    }
                }
            }
        }
        out
    }
}

fn rasterize(face: &TextFace, text: &str, x: f32, y: f32, size_px: f32, pad: u32) -> Option<Coverage> {
    let (glyphs, _) = face.layout_line(text, size_px, x, y);
    let outlined: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| face.font().outline_glyph(g))
        .collect();

    let mut min = (f32::INFINITY, f32::INFINITY);
    let mut max = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for glyph in &outlined {
        let b = glyph.px_bounds();
        min = (min.0.min(b.min.x), min.1.min(b.min.y));
        max = (max.0.max(b.max.x), max.1.max(b.max.y));
    }
    if outlined.is_empty() || max.0 <= min.0 || max.1 <= min.1 {
        return None;
    }

    let pad = pad as i64;
    let origin = (min.0.floor() as i64 - pad, min.1.floor() as i64 - pad);
    let width = (max.0.ceil() as i64 - origin.0 + pad).max(1) as usize;
    let height = (max.1.ceil() as i64 - origin.1 + pad).max(1) as usize;
    let mut coverage = Coverage::new(origin, width, height);

    for glyph in &outlined {
        let b = glyph.px_bounds();
        let gx0 = b.min.x as i64 - origin.0;
        let gy0 = b.min.y as i64 - origin.1;
        glyph.draw(|gx, gy, value| {
            let (cx, cy) = (gx0 + gx as i64, gy0 + gy as i64);
            if cx >= 0 && cy >= 0 {
                coverage.raise(cx as usize, cy as usize, value);
            }
        });
    }
    Some(coverage)
}

/// Draws one line of text whose box has its top-left at (`x`, `y`).
///
/// The stroke is the fill coverage grown by the stroke width, painted first.
/// Every pixel touched by either pass is marked in `ink` when given. Returns
/// the painted bounds, clipped to the canvas.
pub fn draw_text(
    canvas: &mut RgbaImage,
    mut ink: Option<&mut GrayImage>,
    face: &TextFace,
    text: &str,
    (x, y): (f32, f32),
    style: &TextStyle,
) -> PixelRect {
    let stroke_width = style.stroke.map(|(_, w)| w).unwrap_or(0);
    let Some(fill) = rasterize(face, text, x, y, style.size_px, stroke_width + 1) else {
        return PixelRect::default();
    };
    let stroke = style
        .stroke
        .filter(|(_, w)| *w > 0)
        .map(|(color, w)| (color, fill.dilated(w)));

    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let (mut x0, mut y0, mut x1, mut y1) = (i64::MAX, i64::MAX, i64::MIN, i64::MIN);
    for row in 0..fill.height {
        for col in 0..fill.width {
            let px = fill.origin.0 + col as i64;
            let py = fill.origin.1 + row as i64;
            if px < 0 || py < 0 || px >= cw || py >= ch {
                continue;
            }
            let idx = row * fill.width + col;
            let stroke_alpha = stroke.as_ref().map(|(_, s)| s.cells[idx]).unwrap_or(0.0);
            let fill_alpha = fill.cells[idx];
            if stroke_alpha <= 0.0 && fill_alpha <= 0.0 {
                continue;
            }
            let (ux, uy) = (px as u32, py as u32);
            if let Some((color, _)) = &stroke {
                blend_pixel(canvas, ux, uy, *color, stroke_alpha);
            }
            blend_pixel(canvas, ux, uy, style.fill, fill_alpha);
            if let Some(mask) = ink.as_deref_mut() {
                if ux < mask.width() && uy < mask.height() {
                    mask.put_pixel(ux, uy, Luma([255]));
                }
            }
            x0 = x0.min(px);
            y0 = y0.min(py);
            x1 = x1.max(px + 1);
            y1 = y1.max(py + 1);
        }
    }

    if x1 <= x0 || y1 <= y0 {
        return PixelRect::default();
    }
    PixelRect::new(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32)
}

/// Fits `source` inside `rect` (aspect preserved, centered) and alpha-blends it.
/// Returns the rectangle actually covered.
pub fn paste_fit(canvas: &mut RgbaImage, source: &DynamicImage, rect: PixelRect) -> PixelRect {
    if rect.is_empty() || source.width() == 0 || source.height() == 0 {
        return PixelRect::default();
    }
    let fitted = source.resize(rect.width, rect.height, FilterType::Triangle).to_rgba8();
    let x = rect.x + (rect.width.saturating_sub(fitted.width())) / 2;
    let y = rect.y + (rect.height.saturating_sub(fitted.height())) / 2;
    imageops::overlay(canvas, &fitted, x as i64, y as i64);
    PixelRect::new(x, y, fitted.width(), fitted.height()).clamp_to(canvas.width(), canvas.height())
}
