pub mod brand;
pub mod geometry;
pub mod plan;
pub mod report;

pub use brand::{BrandPalette, BrandTokens, LayoutRules, LogoAsset, LogoVariant, TokenError};
pub use geometry::PixelRect;
pub use plan::{AspectRatio, DesignPlan, LogoAnchor, PaletteMode, PlanViolation};
pub use report::{ComplianceReport, SubScore};
