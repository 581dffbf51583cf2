// Blend Importer - import .blend files by driving Blender as an exporter
//
// This is the library crate containing the import pipeline and its data types.
// The binary crate (main.rs) provides the command-line front-end.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{AnalysisResult, ImportOptions, ImporterSettings, UserConfig};
pub use services::{ImportError, ImportOrchestrator, ImportRequest};
pub use state::{ImportStage, StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
