//! Pixel rendering: text faces, raster primitives and the grid compositor.

pub mod canvas;
pub mod compositor;
pub mod font;
pub mod wrap;

pub use compositor::{
    CompositorOutput, GridCompositor, RenderedElement, RenderedText, SkippedElement,
};
pub use font::{embedded_face, TextFace};
pub use wrap::wrap_text;
