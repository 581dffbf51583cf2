//! End-to-end import pipeline.
//!
//! `Start → Analyzed → OptionsResolved → ExportDecided → Exported → Done`, with
//! `Failed` reachable from analysis, option resolution and export. The host
//! supplies the interactive and engine-side pieces through [`ImportHost`].

use crate::metrics::Metrics;
use crate::models::{AnalysisResult, ImportOptions, ImporterSettings};
use crate::services::analysis::parse_analysis_output;
use crate::services::assets::{self, SourceTrackedAsset};
use crate::services::blender::{self, BlenderScript, ScriptSet};
use crate::services::export_cache::{CacheEntry, ExportCache};
use crate::services::process::{ProcessResult, ProcessRunner, WaitDecision};
use crate::state::{ImportStage, StateManager};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort an import
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("{0}")]
    Config(String),

    #[error("Source file not found: {0}")]
    SourceNotFound(Utf8PathBuf),

    #[error("Blender could not analyse {0}")]
    AnalysisFailed(Utf8PathBuf),

    #[error("Import of {0} was cancelled")]
    UserCancelled(Utf8PathBuf),

    #[error("There was an issue while exporting {path} from Blender: {reason}")]
    ExportToolError { path: Utf8PathBuf, reason: String },

    #[error("The interchange importer produced no assets from {0}")]
    InterchangeImportFailed(Utf8PathBuf),

    #[error("Asset '{0}' was not imported from a .blend file")]
    NotReimportable(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ImportError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ImportError::UserCancelled(_))
    }
}

/// Advisory findings from analysis. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    MaterialIssues { source: Utf8PathBuf, details: String },
    PackedTextures { source: Utf8PathBuf },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MaterialIssues { source, details } => write!(
                f,
                "Material issues were detected in '{}', which may make your materials not display properly.\n\
                 Issues:\n{}",
                source, details
            ),
            Diagnostic::PackedTextures { source } => write!(
                f,
                "Packed textures have been detected in '{}', which will inflate the size of the FBX interchange data and increase import times.\n\
                 Consider unpacking those resources from your .blend file before importing.",
                source
            ),
        }
    }
}

/// Modal options prompt shown when no reusable options exist
#[cfg_attr(test, mockall::automock)]
pub trait OptionsPrompt {
    /// Ask the user for options. `None` means the user cancelled.
    fn prompt_options(
        &mut self,
        source: &Utf8Path,
        analysis: &AnalysisResult,
        previous: &ImportOptions,
    ) -> Option<ImportOptions>;
}

/// Asked what to do each time Blender runs past the unresponsive timeout
#[cfg_attr(test, mockall::automock)]
pub trait UnresponsivePrompt {
    fn on_unresponsive(&mut self, elapsed: Duration) -> WaitDecision;
}

/// What the downstream importer is asked to import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterchangeRequest {
    pub interchange_file: Utf8PathBuf,
    pub source: Utf8PathBuf,
    pub asset_name: String,
}

/// Assets created by the downstream importer
pub struct ImportedObjects {
    pub primary: Box<dyn SourceTrackedAsset>,
    /// Extra meshes and animations created alongside the primary asset
    pub secondary: Vec<Box<dyn SourceTrackedAsset>>,
}

impl ImportedObjects {
    pub fn new(primary: Box<dyn SourceTrackedAsset>) -> Self {
        Self {
            primary,
            secondary: Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn SourceTrackedAsset + 'static)> {
        std::iter::once(&self.primary)
            .chain(self.secondary.iter())
            .map(|asset| asset.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn SourceTrackedAsset>> {
        std::iter::once(&mut self.primary).chain(self.secondary.iter_mut())
    }
}

/// The importer that turns the interchange file into host assets
#[cfg_attr(test, mockall::automock)]
pub trait InterchangeImporter {
    /// `None` means the import failed
    fn import_interchange(&mut self, request: &InterchangeRequest) -> Option<ImportedObjects>;
}

/// Host-side collaborators for one import
pub struct ImportHost<'a> {
    pub options_prompt: &'a mut dyn OptionsPrompt,
    pub unresponsive_prompt: &'a mut dyn UnresponsivePrompt,
    pub importer: &'a mut dyn InterchangeImporter,
}

/// A request to import one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub source: Utf8PathBuf,
    /// Name for the primary asset
    pub asset_name: String,
}

impl ImportRequest {
    pub fn new(source: impl Into<Utf8PathBuf>, asset_name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            asset_name: asset_name.into(),
        }
    }

    /// Request named after the source file's stem
    pub fn for_source(source: impl Into<Utf8PathBuf>) -> Self {
        let source = source.into();
        let asset_name = source.file_stem().unwrap_or("Blend").to_string();
        Self { source, asset_name }
    }
}

/// Result of a successful import
pub struct ImportOutcome {
    pub objects: ImportedObjects,
    pub options: ImportOptions,
    pub interchange_file: Utf8PathBuf,
    /// A previous export was reused and Blender's export step did not run
    pub export_skipped: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// Diagnostics deserve the user's attention (first import, not reimport)
    pub surface_diagnostics: bool,
}

/// Outcome of [`ImportOrchestrator::reimport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReimportResult {
    Succeeded,
    Cancelled,
    Failed,
}

/// Drives the analyse → options → export → import pipeline.
///
/// One instance lives for an editor session and remembers the last export so
/// reimports of an unchanged file skip Blender's export step.
pub struct ImportOrchestrator {
    settings: ImporterSettings,
    runner: ProcessRunner,
    scripts: ScriptSet,
    cache: ExportCache,
    interchange_dir: Utf8PathBuf,
    last_options: ImportOptions,
    state: Arc<StateManager>,
    metrics: Arc<Metrics>,
}

impl ImportOrchestrator {
    /// Create an orchestrator that writes interchange files to the system temp directory
    pub fn new(settings: ImporterSettings) -> Result<Self, ImportError> {
        let temp = Utf8PathBuf::from_path_buf(std::env::temp_dir()).map_err(|p| {
            ImportError::Config(format!("Temp directory is not valid UTF-8: {}", p.display()))
        })?;
        Self::with_interchange_dir(settings, temp)
    }

    pub fn with_interchange_dir(
        settings: ImporterSettings,
        interchange_dir: impl Into<Utf8PathBuf>,
    ) -> Result<Self, ImportError> {
        let scripts = ScriptSet::from_settings(&settings)
            .map_err(|e| ImportError::io("Failed to prepare Blender scripts", e))?;

        Ok(Self {
            settings,
            runner: ProcessRunner::new(),
            scripts,
            cache: ExportCache::new(),
            interchange_dir: interchange_dir.into(),
            last_options: ImportOptions::default(),
            state: Arc::new(StateManager::new()),
            metrics: Arc::new(Metrics::new()),
        })
    }

    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_state_manager(mut self, state: Arc<StateManager>) -> Self {
        self.state = state;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn settings(&self) -> &ImporterSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: ImporterSettings) {
        self.settings = settings;
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn export_cache(&self) -> &ExportCache {
        &self.cache
    }

    /// Options chosen for the most recent successful import
    pub fn last_options(&self) -> &ImportOptions {
        &self.last_options
    }

    /// Run Blender's analysis script on `source`
    pub async fn analyse(
        &self,
        source: &Utf8Path,
        unresponsive_prompt: &mut dyn UnresponsivePrompt,
    ) -> Result<AnalysisResult, ImportError> {
        let blender = blender::resolve_blender_executable(&self.settings)?;
        self.analyse_with(&blender, source, unresponsive_prompt).await
    }

    /// Import `request.source`.
    ///
    /// `existing` is the asset being reimported, if any; its stored options are
    /// reused without prompting when they parse.
    pub async fn import(
        &mut self,
        request: &ImportRequest,
        existing: Option<&dyn SourceTrackedAsset>,
        host: &mut ImportHost<'_>,
    ) -> Result<ImportOutcome, ImportError> {
        // Configuration problems abort before any state is touched
        let blender = blender::resolve_blender_executable(&self.settings).inspect_err(|e| {
            tracing::error!("{}", e);
        })?;

        self.state.begin_import(&request.source);
        tracing::info!("Importing {} as '{}'", request.source, request.asset_name);

        let result = self.run_pipeline(&blender, request, existing, host).await;

        match &result {
            Ok(outcome) => {
                self.metrics.record_import_succeeded();
                self.state.finish(
                    true,
                    format!(
                        "Imported {} ({} secondary assets)",
                        request.source,
                        outcome.objects.secondary.len()
                    ),
                );
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.metrics.record_import_cancelled();
                    tracing::warn!("-- Import canceled");
                } else {
                    self.metrics.record_import_failed();
                    tracing::error!("-- Import failed: {}", e);
                }
                self.state.finish(false, e.to_string());
            }
        }

        result
    }

    /// Reimport `asset` from its recorded source path
    pub async fn reimport(
        &mut self,
        asset: &mut dyn SourceTrackedAsset,
        host: &mut ImportHost<'_>,
    ) -> ReimportResult {
        tracing::info!(
            "Re-importing Blend Asset: {} ({})",
            asset.name(),
            asset.kind().as_str()
        );

        let Some(source) = assets::can_reimport(&*asset).and_then(|paths| paths.into_iter().next())
        else {
            tracing::error!("{}", ImportError::NotReimportable(asset.name().to_string()));
            return ReimportResult::Failed;
        };

        let request = ImportRequest::new(source, asset.name());
        match self.import(&request, Some(&*asset), host).await {
            Ok(outcome) => {
                asset.set_source_path(&request.source);
                asset.persist_import_options(&outcome.options.to_metadata_string());
                ReimportResult::Succeeded
            }
            Err(e) if e.is_cancelled() => ReimportResult::Cancelled,
            Err(_) => ReimportResult::Failed,
        }
    }

    async fn run_pipeline(
        &mut self,
        blender: &Utf8Path,
        request: &ImportRequest,
        existing: Option<&dyn SourceTrackedAsset>,
        host: &mut ImportHost<'_>,
    ) -> Result<ImportOutcome, ImportError> {
        let source = request.source.as_path();

        if !source.is_file() {
            return Err(ImportError::SourceNotFound(source.to_path_buf()));
        }

        // Start -> Analyzed
        let analysis = self
            .analyse_with(blender, source, &mut *host.unresponsive_prompt)
            .await?;
        self.state.advance(ImportStage::Analyzed);

        let diagnostics = collect_diagnostics(source, &analysis);
        for diagnostic in &diagnostics {
            tracing::warn!("{}", diagnostic);
        }

        // Analyzed -> OptionsResolved
        let options = match existing.and_then(load_existing_options) {
            Some(options) => {
                tracing::debug!("Reusing stored import options: {}", options);
                options
            }
            None => host
                .options_prompt
                .prompt_options(source, &analysis, &self.last_options)
                .ok_or_else(|| ImportError::UserCancelled(source.to_path_buf()))?,
        };
        self.state.advance(ImportStage::OptionsResolved);

        // OptionsResolved -> ExportDecided
        let interchange_file = blender::interchange_path(&self.interchange_dir, source);
        let fingerprint = CacheEntry::for_source(source, options.to_metadata_string())
            .map_err(|e| ImportError::io(format!("Failed to fingerprint {}", source), e))?;

        let export_skipped = if self.cache.matches(&fingerprint) {
            if interchange_file.is_file() {
                tracing::info!("No source file changes detected, skipping export of FBX");
                true
            } else {
                tracing::info!(
                    "Previous export {} no longer exists, exporting again",
                    interchange_file
                );
                false
            }
        } else {
            false
        };
        self.state.advance(ImportStage::ExportDecided);

        // ExportDecided -> Exported
        if export_skipped {
            self.metrics.record_export_skipped();
            self.state.mark_export_skipped();
        } else {
            self.export(
                blender,
                source,
                &interchange_file,
                &options,
                analysis.is_packed,
                &mut *host.unresponsive_prompt,
            )
            .await?;
            self.cache.record_export(fingerprint);
        }
        self.state.advance(ImportStage::Exported);

        // Exported -> Done
        tracing::info!("Importing FBX...");
        let interchange_request = InterchangeRequest {
            interchange_file: interchange_file.clone(),
            source: source.to_path_buf(),
            asset_name: request.asset_name.clone(),
        };
        let mut objects = host
            .importer
            .import_interchange(&interchange_request)
            .ok_or_else(|| ImportError::InterchangeImportFailed(interchange_file.clone()))?;

        let signature = options.to_metadata_string();
        for asset in objects.iter_mut() {
            asset.set_source_path(source);
            asset.persist_import_options(&signature);
            if asset.kind() == assets::AssetKind::Animation {
                tracing::info!("Animation '{}' was imported.", asset.name());
            }
        }

        self.last_options = options.clone();

        Ok(ImportOutcome {
            objects,
            options,
            interchange_file,
            export_skipped,
            diagnostics,
            surface_diagnostics: existing.is_none(),
        })
    }

    async fn analyse_with(
        &self,
        blender: &Utf8Path,
        source: &Utf8Path,
        unresponsive_prompt: &mut dyn UnresponsivePrompt,
    ) -> Result<AnalysisResult, ImportError> {
        let spec = blender::script_invocation(
            &self.settings,
            blender,
            source,
            &self.scripts.path(BlenderScript::Analyse),
        );

        let result = self.run_blender(&spec, unresponsive_prompt).await?;
        if result.was_cancelled_by_user {
            return Err(ImportError::UserCancelled(source.to_path_buf()));
        }
        if !result.succeeded {
            return Err(ImportError::AnalysisFailed(source.to_path_buf()));
        }

        Ok(parse_analysis_output(&result.combined_output))
    }

    async fn export(
        &self,
        blender: &Utf8Path,
        source: &Utf8Path,
        interchange_file: &Utf8Path,
        options: &ImportOptions,
        unpack: bool,
        unresponsive_prompt: &mut dyn UnresponsivePrompt,
    ) -> Result<(), ImportError> {
        tracing::info!("Exporting FBX from Blender...");

        if let Some(dir) = interchange_file.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| ImportError::io(format!("Failed to create {}", dir), e))?;
        }

        // A stale file from an earlier run must not pass for this run's output
        match fs::remove_file(interchange_file) {
            Ok(()) => tracing::debug!("Removed stale {}", interchange_file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ImportError::io(
                    format!("Failed to remove stale {}", interchange_file),
                    e,
                ));
            }
        }

        let mut spec = blender::script_invocation(
            &self.settings,
            blender,
            source,
            &self.scripts.path(BlenderScript::Export),
        );
        spec.env = blender::export_environment(
            interchange_file,
            options,
            self.settings.fix_materials,
            unpack,
        );

        let result = self.run_blender(&spec, unresponsive_prompt).await?;
        if result.was_cancelled_by_user {
            return Err(ImportError::UserCancelled(source.to_path_buf()));
        }
        if !result.succeeded {
            return Err(ImportError::ExportToolError {
                path: source.to_path_buf(),
                reason: "Blender did not run to completion".to_string(),
            });
        }

        self.metrics.record_export_run();

        if !interchange_file.is_file() {
            return Err(ImportError::ExportToolError {
                path: source.to_path_buf(),
                reason: format!("expected output {} was not written", interchange_file),
            });
        }

        Ok(())
    }

    async fn run_blender(
        &self,
        spec: &crate::services::process::ProcessSpec,
        unresponsive_prompt: &mut dyn UnresponsivePrompt,
    ) -> Result<ProcessResult, ImportError> {
        let result = self
            .runner
            .run(spec, self.settings.unresponsive_timeout(), |elapsed| {
                unresponsive_prompt.on_unresponsive(elapsed)
            })
            .await
            .map_err(|e| ImportError::Config(e.to_string()))?;

        self.metrics.record_blender_run(result.duration);

        if let Some(code) = result.exit_code.filter(|code| *code != 0) {
            tracing::warn!("Blender exited with code {}", code);
        }

        Ok(result)
    }
}

fn load_existing_options(asset: &dyn SourceTrackedAsset) -> Option<ImportOptions> {
    let Some(data) = asset.load_import_options() else {
        tracing::warn!(
            "No stored import options on '{}'. Showing options again.",
            asset.name()
        );
        return None;
    };

    match data.parse::<ImportOptions>() {
        Ok(options) => Some(options),
        Err(e) => {
            tracing::warn!(
                "There was an issue loading the metadata for '{}' to allow re-import ({}). Showing options again.",
                asset.name(),
                e
            );
            None
        }
    }
}

fn collect_diagnostics(source: &Utf8Path, analysis: &AnalysisResult) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if analysis.has_material_warnings() {
        diagnostics.push(Diagnostic::MaterialIssues {
            source: source.to_path_buf(),
            details: analysis.material_warning_text(),
        });
    }

    if analysis.is_packed {
        diagnostics.push(Diagnostic::PackedTextures {
            source: source.to_path_buf(),
        });
    }

    diagnostics
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::services::assets::AssetKind;
    use crate::services::assets::testing::TestAsset;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        root: Utf8PathBuf,
        source: Utf8PathBuf,
        export_log: Utf8PathBuf,
        settings: ImporterSettings,
    }

    /// A stand-in `blender` that prints `analysis` for the analyse script and
    /// writes the requested output file for the export script.
    fn fixture(analysis: &str, export_sleep_secs: u32) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let source = root.join("scene.blend");
        fs::write(&source, b"BLENDER-v303 scene").unwrap();

        let export_log = root.join("exports.log");
        let script = format!(
            "#!/bin/sh\n\
             for last; do :; done\n\
             case \"$last\" in\n\
             *blender_analyse.py)\n\
             cat <<'EOF'\n{analysis}\nEOF\n\
             ;;\n\
             *blender_export.py)\n\
             sleep {export_sleep_secs}\n\
             echo export >> \"{log}\"\n\
             printf 'FBX' > \"$UNREAL_IMPORTER_OUTPUT_FILE\"\n\
             ;;\n\
             esac\n",
            log = export_log,
        );
        let blender = root.join("blender");
        fs::write(&blender, script).unwrap();
        fs::set_permissions(&blender, fs::Permissions::from_mode(0o755)).unwrap();

        let settings = ImporterSettings {
            blender_executable: blender.to_string(),
            unresponsive_warning_duration: 5.0,
            ..Default::default()
        };

        Fixture {
            _dir: dir,
            root,
            source,
            export_log,
            settings,
        }
    }

    fn orchestrator(fx: &Fixture) -> ImportOrchestrator {
        ImportOrchestrator::with_interchange_dir(fx.settings.clone(), fx.root.join("out"))
            .unwrap()
            .with_runner(ProcessRunner::with_poll_interval(Duration::from_millis(20)))
    }

    fn export_count(fx: &Fixture) -> usize {
        fs::read_to_string(&fx.export_log)
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    fn mesh_importer() -> MockInterchangeImporter {
        let mut importer = MockInterchangeImporter::new();
        importer.expect_import_interchange().returning(|request| {
            Some(ImportedObjects::new(Box::new(TestAsset::new(
                &request.asset_name,
                AssetKind::StaticMesh,
                None,
            ))))
        });
        importer
    }

    #[tokio::test]
    async fn test_cancelled_prompt_aborts_before_export() {
        let fx = fixture("C|Props,}", 0);
        fs::create_dir_all(fx.root.join("out")).unwrap();
        let mut orchestrator = orchestrator(&fx);

        let mut prompt = MockOptionsPrompt::new();
        prompt.expect_prompt_options().times(1).returning(|_, _, _| None);
        let mut unresponsive = MockUnresponsivePrompt::new();
        unresponsive.expect_on_unresponsive().never();
        let mut importer = MockInterchangeImporter::new();
        importer.expect_import_interchange().never();

        let mut host = ImportHost {
            options_prompt: &mut prompt,
            unresponsive_prompt: &mut unresponsive,
            importer: &mut importer,
        };

        let err = orchestrator
            .import(&ImportRequest::for_source(fx.source.clone()), None, &mut host)
            .await
            .err()
            .unwrap();

        assert!(err.is_cancelled());
        assert_eq!(export_count(&fx), 0);
        assert!(orchestrator.export_cache().last_export().is_none());
        assert_eq!(orchestrator.state().snapshot().stage, ImportStage::Failed);
    }

    #[tokio::test]
    async fn test_prompt_receives_analysis() {
        let fx = fixture("C|Props,Lights,}\nM|Rock|NO_MATERIAL_OUTPUT,}", 0);
        fs::create_dir_all(fx.root.join("out")).unwrap();
        let mut orchestrator = orchestrator(&fx);

        let mut prompt = MockOptionsPrompt::new();
        prompt
            .expect_prompt_options()
            .times(1)
            .withf(|_, analysis, previous| {
                analysis.collections.len() == 2
                    && analysis.has_material_warnings()
                    && *previous == ImportOptions::default()
            })
            .returning(|_, _, _| Some(ImportOptions::new(true).with_collections(["Lights"])));
        let mut unresponsive = MockUnresponsivePrompt::new();
        let mut importer = mesh_importer();

        let mut host = ImportHost {
            options_prompt: &mut prompt,
            unresponsive_prompt: &mut unresponsive,
            importer: &mut importer,
        };

        let outcome = orchestrator
            .import(&ImportRequest::for_source(fx.source.clone()), None, &mut host)
            .await
            .unwrap();

        assert_eq!(outcome.options.to_metadata_string(), "true;Lights");
        assert_eq!(
            outcome.objects.primary.load_import_options().as_deref(),
            Some("true;Lights")
        );
        assert_eq!(outcome.objects.primary.first_source_path(), Some(fx.source.clone()));
        assert!(outcome.surface_diagnostics);
        assert!(matches!(
            outcome.diagnostics.as_slice(),
            [Diagnostic::MaterialIssues { .. }]
        ));
        assert_eq!(export_count(&fx), 1);
    }

    #[tokio::test]
    async fn test_unresponsive_export_terminated() {
        let mut fx = fixture("C|Props,}", 10);
        fx.settings.unresponsive_warning_duration = 0.3;
        fs::create_dir_all(fx.root.join("out")).unwrap();
        let mut orchestrator = orchestrator(&fx);

        let mut prompt = MockOptionsPrompt::new();
        prompt
            .expect_prompt_options()
            .returning(|_, _, _| Some(ImportOptions::default()));
        let mut unresponsive = MockUnresponsivePrompt::new();
        unresponsive
            .expect_on_unresponsive()
            .times(1)
            .returning(|_| WaitDecision::Terminate);
        let mut importer = MockInterchangeImporter::new();
        importer.expect_import_interchange().never();

        let mut host = ImportHost {
            options_prompt: &mut prompt,
            unresponsive_prompt: &mut unresponsive,
            importer: &mut importer,
        };

        let err = orchestrator
            .import(&ImportRequest::for_source(fx.source.clone()), None, &mut host)
            .await
            .err()
            .unwrap();

        assert!(err.is_cancelled());
        assert!(orchestrator.export_cache().last_export().is_none());
        assert_eq!(
            orchestrator
                .metrics()
                .imports_cancelled
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_corrupt_stored_options_fall_back_to_prompt() {
        let fx = fixture("C|Props,}", 0);
        fs::create_dir_all(fx.root.join("out")).unwrap();
        let mut orchestrator = orchestrator(&fx);

        let mut existing = TestAsset::new("scene", AssetKind::StaticMesh, Some(fx.source.as_str()));
        existing.options = Some("garbage".to_string());

        let mut prompt = MockOptionsPrompt::new();
        prompt
            .expect_prompt_options()
            .times(1)
            .returning(|_, _, _| Some(ImportOptions::default().with_collections(["Props"])));
        let mut unresponsive = MockUnresponsivePrompt::new();
        let mut importer = mesh_importer();

        let mut host = ImportHost {
            options_prompt: &mut prompt,
            unresponsive_prompt: &mut unresponsive,
            importer: &mut importer,
        };

        let result = orchestrator.reimport(&mut existing, &mut host).await;
        assert_eq!(result, ReimportResult::Succeeded);
        assert_eq!(existing.options.as_deref(), Some("false;Props"));
    }

    #[tokio::test]
    async fn test_reimport_rejects_non_blend_asset() {
        let fx = fixture("C|Props,}", 0);
        let mut orchestrator = orchestrator(&fx);

        let mut asset = TestAsset::new("SM_Tree", AssetKind::StaticMesh, Some("/art/tree.fbx"));
        let mut prompt = MockOptionsPrompt::new();
        prompt.expect_prompt_options().never();
        let mut unresponsive = MockUnresponsivePrompt::new();
        let mut importer = MockInterchangeImporter::new();

        let mut host = ImportHost {
            options_prompt: &mut prompt,
            unresponsive_prompt: &mut unresponsive,
            importer: &mut importer,
        };

        assert_eq!(
            orchestrator.reimport(&mut asset, &mut host).await,
            ReimportResult::Failed
        );
    }

    #[tokio::test]
    async fn test_missing_source_fails_without_running_blender() {
        let fx = fixture("C|Props,}", 0);
        let mut orchestrator = orchestrator(&fx);

        let mut prompt = MockOptionsPrompt::new();
        prompt.expect_prompt_options().never();
        let mut unresponsive = MockUnresponsivePrompt::new();
        let mut importer = MockInterchangeImporter::new();

        let mut host = ImportHost {
            options_prompt: &mut prompt,
            unresponsive_prompt: &mut unresponsive,
            importer: &mut importer,
        };

        let err = orchestrator
            .import(
                &ImportRequest::for_source(fx.root.join("missing.blend")),
                None,
                &mut host,
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ImportError::SourceNotFound(_)));
    }

    #[test]
    fn test_collect_diagnostics() {
        let source = Utf8Path::new("/art/scene.blend");
        let mut analysis = AnalysisResult::default();
        assert!(collect_diagnostics(source, &analysis).is_empty());

        analysis.is_packed = true;
        let diagnostics = collect_diagnostics(source, &analysis);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].to_string().contains("Packed textures"));
    }
}
