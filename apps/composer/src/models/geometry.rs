use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle; `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersects with a `canvas_w` × `canvas_h` canvas. May return an empty rect.
    pub fn clamp_to(&self, canvas_w: u32, canvas_h: u32) -> PixelRect {
        let x = self.x.min(canvas_w);
        let y = self.y.min(canvas_h);
        let right = self.right().min(canvas_w);
        let bottom = self.bottom().min(canvas_h);
        PixelRect::new(x, y, right - x, bottom - y)
    }

    /// Smallest rect containing both.
    pub fn union(&self, other: &PixelRect) -> PixelRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        PixelRect::new(x, y, right - x, bottom - y)
    }
}
