//! Data models for the Blend importer.
//!
//! - [`ImportOptions`]: Per-import user choices, persisted per asset as a compact string
//! - [`AnalysisResult`]: Collections, material warnings and packed-texture flag reported by Blender
//! - [`UserConfig`]: Importer settings loaded from `BlendImporter Settings.yaml`

pub mod analysis;
pub mod config;
pub mod import_options;

pub use analysis::{AnalysisResult, MaterialWarning};
pub use config::{ImporterSettings, UserConfig};
pub use import_options::{ImportOptions, OptionsParseError};
