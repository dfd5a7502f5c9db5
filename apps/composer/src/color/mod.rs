// Color math primitives: hex parsing, WCAG luminance/contrast, CIEDE2000.
// Everything here is pure and allocation-free.

pub mod contrast;
pub mod delta_e;
pub mod rgb;

pub use contrast::{best_text_color_on, contrast_ratio, contrast_ratio_from_luminance, relative_luminance};
pub use delta_e::{delta_e_2000, Lab};
pub use rgb::{ColorParseError, Rgb};
