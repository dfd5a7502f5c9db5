pub mod catalog;
pub mod density;
pub mod grid;
pub mod selector;

pub use catalog::{
    default_template, DensityClass, LayoutTemplate, Slot, SlotRect, SlotStyle, SlotType,
    TemplateCatalog, TextAlign, TextRole, DEFAULT_TEMPLATE_ID,
};
pub use density::{analyze_density, ContentDensity};
pub use grid::GridSpec;
pub use selector::{select_template, SelectionTier, TemplateSelection};
