// UI module - command-line front-end pieces
//
// This module contains:
// - Terminal prompts that stand in for the editor's options and unresponsive dialogs
// - AssetStore / CopyImporter: a file-backed stand-in for the editor's asset registry

pub mod store;
pub mod terminal;

pub use store::{AssetRecord, AssetStore, CopyImporter};
pub use terminal::{
    StdinInput, TerminalOptionsPrompt, TerminalUnresponsivePrompt, spawn_progress_listener,
};
