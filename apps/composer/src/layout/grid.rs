use super::catalog::SlotRect;
use crate::models::{LayoutRules, PixelRect};

/// Resolves grid-cell rectangles to canvas pixels.
///
/// The content area is the canvas inset by `margin`; cells are separated by
/// `gutter`. If margins and gutters would leave no room for a cell they are
/// dropped to zero, so every resolved rectangle stays inside the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub columns: u32,
    pub rows: u32,
    pub margin: u32,
    pub gutter: u32,
}

impl GridSpec {
    pub fn new(canvas: (u32, u32), rules: &LayoutRules) -> Self {
        Self {
            canvas_width: canvas.0,
            canvas_height: canvas.1,
            columns: rules.grid_columns.max(1),
            rows: rules.grid_rows.max(1),
            margin: rules.margin_px,
            gutter: rules.gutter_px,
        }
    }

    pub fn canvas_rect(&self) -> PixelRect {
        PixelRect::new(0, 0, self.canvas_width, self.canvas_height)
    }

    pub fn resolve(&self, rect: &SlotRect) -> PixelRect {
        match *rect {
            SlotRect::Full => self.canvas_rect(),
            SlotRect::Cells {
                col,
                row,
                col_span,
                row_span,
            } => {
                let (x, width) = axis(self.canvas_width, self.columns, self.margin, self.gutter, col, col_span);
                let (y, height) = axis(self.canvas_height, self.rows, self.margin, self.gutter, row, row_span);
                PixelRect::new(x, y, width, height).clamp_to(self.canvas_width, self.canvas_height)
            }
        }
    }
}

/// Start and length along one axis.
fn axis(extent: u32, cells: u32, margin: u32, gutter: u32, start: u32, span: u32) -> (u32, u32) {
    let cells = cells.max(1);
    let start = start.min(cells - 1);
    let span = span.max(1).min(cells - start);

    let (margin, gutter) = if cell_size(extent, cells, margin, gutter) > 0.0 {
        (margin, gutter)
    } else {
        (0, 0)
    };
    let cell = cell_size(extent, cells, margin, gutter).max(0.0);

    let offset = margin as f64 + start as f64 * (cell + gutter as f64);
    let length = span as f64 * cell + (span - 1) as f64 * gutter as f64;
    (offset.round() as u32, length.round() as u32)
}

fn cell_size(extent: u32, cells: u32, margin: u32, gutter: u32) -> f64 {
    let usable = extent as f64 - 2.0 * margin as f64 - (cells - 1) as f64 * gutter as f64;
    usable / cells as f64
}
