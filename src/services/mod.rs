//! Services module - the import pipeline.
//!
//! Everything here is framework-agnostic: the interactive pieces (option
//! prompts, the unresponsive-Blender prompt, the engine-side importer) are
//! traits supplied by the caller through [`ImportHost`].
//!
//! # Components
//!
//! - [`ProcessRunner`]: runs an external program with combined output capture
//!   and an unresponsive-timeout callback that can terminate it.
//! - [`parse_analysis_output`]: reads the line protocol Blender's analysis
//!   script prints (`C|`, `M|`, `P|` lines).
//! - [`ExportCache`]: remembers the last export so unchanged reimports skip
//!   Blender's export step.
//! - [`blender`]: command lines, bundled scripts and executable discovery.
//! - [`assets`]: the source-tracking capability reimport relies on.
//! - [`ImportOrchestrator`]: ties the above together.
//!
//! # Usage Example
//!
//! ```ignore
//! use blend_importer::services::{ImportHost, ImportOrchestrator, ImportRequest};
//!
//! let mut orchestrator = ImportOrchestrator::new(settings)?;
//! let mut host = ImportHost {
//!     options_prompt: &mut prompt,
//!     unresponsive_prompt: &mut unresponsive,
//!     importer: &mut importer,
//! };
//!
//! let outcome = orchestrator
//!     .import(&ImportRequest::for_source("art/scene.blend"), None, &mut host)
//!     .await?;
//! ```

pub mod analysis;
pub mod assets;
pub mod blender;
pub mod export_cache;
pub mod orchestrator;
pub mod process;

pub use analysis::parse_analysis_output;
pub use assets::{AssetKind, SourceTrackedAsset};
pub use export_cache::{CacheEntry, ContentHash, ExportCache};
pub use orchestrator::{
    Diagnostic, ImportError, ImportHost, ImportOrchestrator, ImportOutcome, ImportRequest,
    ImportedObjects, InterchangeImporter, InterchangeRequest, OptionsPrompt, ReimportResult,
    UnresponsivePrompt,
};
pub use process::{ProcessError, ProcessResult, ProcessRunner, ProcessSpec, WaitDecision};
