//! Composition & validation engine for on-brand marketing graphics.
//!
//! Takes a background raster (or none), a brand's visual-identity tokens and a
//! design plan, and produces final pixels plus a compliance verdict.
//!
//! Control flow: plan + tokens → background gate → template selection →
//! grid compositor (logo placement delegated) → compliance validator.
//! The engine holds no session state; tokens, catalog and validator are
//! read-only and shared across concurrent requests.

pub mod assets;
pub mod color;
pub mod config;
pub mod errors;
pub mod gate;
pub mod layout;
pub mod logo;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod telemetry;
pub mod validator;

pub use assets::{AssetFetcher, HttpAssetFetcher};
pub use config::EngineConfig;
pub use errors::{AssetError, ComposeError};
pub use gate::{BackgroundGate, BackgroundGenerator, RetryOutcome, TextCheck, TextDetector};
pub use layout::{select_template, TemplateCatalog};
pub use models::{
    AspectRatio, BrandPalette, BrandTokens, ComplianceReport, DesignPlan, LogoAnchor, LogoAsset,
    LogoVariant, PaletteMode,
};
pub use pipeline::{BackgroundSource, CompositionEngine, CompositionResult};
pub use validator::{BrandValidator, ComplianceValidator};
