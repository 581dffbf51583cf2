// State management module
//
// Tracks where the current import is in its pipeline and broadcasts every
// transition so a front-end can follow along without polling.

use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Stages of one import, in pipeline order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ImportStage {
    #[default]
    Start,
    Analyzed,
    OptionsResolved,
    ExportDecided,
    Exported,
    Done,
    Failed,
}

impl ImportStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportStage::Done | ImportStage::Failed)
    }
}

/// Snapshot of the importer's observable state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportState {
    pub stage: ImportStage,
    pub source: Option<Utf8PathBuf>,
    /// Human-readable reason for the most recent failure
    pub last_error: Option<String>,
    /// Whether the current import reused a previous export
    pub export_skipped: bool,
}

/// Change events emitted when state is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A new import has started for `source`
    ImportStarted { source: Utf8PathBuf },

    /// The pipeline moved to a new stage
    StageChanged { stage: ImportStage },

    /// The export step was satisfied by a previous export
    ExportSkipped { source: Utf8PathBuf },

    /// The import ended
    ImportFinished { succeeded: bool, message: String },
}

/// Thread-safe holder for [`ImportState`] that broadcasts [`StateChange`] events
pub struct StateManager {
    state: Arc<RwLock<ImportState>>,
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with a broadcast buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(ImportState::default())),
            state_tx,
        }
    }

    pub fn snapshot(&self) -> ImportState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the state
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ImportState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn update<F>(&self, update_fn: F)
    where
        F: FnOnce(&mut ImportState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        update_fn(&mut state);
    }

    fn emit(&self, change: StateChange) {
        // Ignore send errors - it's OK if no one is listening
        let _ = self.state_tx.send(change);
    }

    /// Reset for a new import of `source`
    pub fn begin_import(&self, source: &Utf8Path) {
        self.update(|state| {
            *state = ImportState {
                source: Some(source.to_path_buf()),
                ..Default::default()
            };
        });
        self.emit(StateChange::ImportStarted {
            source: source.to_path_buf(),
        });
    }

    /// Move to `stage`. Repeating the current stage emits nothing.
    pub fn advance(&self, stage: ImportStage) {
        let changed = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let changed = state.stage != stage;
            state.stage = stage;
            changed
        };

        if changed {
            tracing::debug!("Import stage -> {:?}", stage);
            self.emit(StateChange::StageChanged { stage });
        }
    }

    pub fn mark_export_skipped(&self) {
        let source = self.read(|state| state.source.clone());
        self.update(|state| state.export_skipped = true);
        if let Some(source) = source {
            self.emit(StateChange::ExportSkipped { source });
        }
    }

    pub fn finish(&self, succeeded: bool, message: impl Into<String>) {
        let message = message.into();
        self.advance(if succeeded {
            ImportStage::Done
        } else {
            ImportStage::Failed
        });
        self.update(|state| {
            state.last_error = (!succeeded).then(|| message.clone());
        });
        self.emit(StateChange::ImportFinished { succeeded, message });
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let manager = StateManager::new();
        let state = manager.snapshot();
        assert_eq!(state.stage, ImportStage::Start);
        assert!(state.source.is_none());
        assert!(!state.export_skipped);
    }

    #[test]
    fn test_stage_events() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.begin_import(Utf8Path::new("/art/scene.blend"));
        manager.advance(ImportStage::Analyzed);
        manager.advance(ImportStage::Analyzed);
        manager.advance(ImportStage::OptionsResolved);

        assert_eq!(
            rx.try_recv().unwrap(),
            StateChange::ImportStarted {
                source: Utf8PathBuf::from("/art/scene.blend")
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            StateChange::StageChanged {
                stage: ImportStage::Analyzed
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            StateChange::StageChanged {
                stage: ImportStage::OptionsResolved
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_finish_failed_records_error() {
        let manager = StateManager::new();
        manager.begin_import(Utf8Path::new("/art/scene.blend"));
        manager.finish(false, "Import cancelled");

        let state = manager.snapshot();
        assert_eq!(state.stage, ImportStage::Failed);
        assert!(state.stage.is_terminal());
        assert_eq!(state.last_error.as_deref(), Some("Import cancelled"));
    }

    #[test]
    fn test_begin_import_resets() {
        let manager = StateManager::new();
        manager.begin_import(Utf8Path::new("/art/a.blend"));
        manager.mark_export_skipped();
        manager.finish(true, "done");

        manager.begin_import(Utf8Path::new("/art/b.blend"));
        let state = manager.snapshot();
        assert_eq!(state.stage, ImportStage::Start);
        assert!(!state.export_skipped);
        assert_eq!(state.source, Some(Utf8PathBuf::from("/art/b.blend")));
    }
}
