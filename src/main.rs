//! Blend Importer - import .blend files by driving Blender as an exporter
//!
//! Command-line entry point.
//!
//! # Overview
//!
//! Each command initializes:
//! - Logging infrastructure (file rotation + console output)
//! - A tokio runtime for running Blender as a subprocess
//! - Configuration loading ([`ConfigManager`])
//! - The asset store in the content directory ([`AssetStore`])
//!
//! # Configuration Files
//!
//! Expected in the config directory (default `BlendImporter Data/`):
//! - `BlendImporter Settings.yaml`: Blender path and launch options
//!
//! Imported assets are tracked in `<content dir>/assets.yaml` and their
//! interchange data is copied next to it.

use anyhow::{Context, Result, bail};
use blend_importer::services::assets::{self, AssetKind, SourceTrackedAsset};
use blend_importer::services::{ImportHost, ImportOrchestrator, ImportRequest, ReimportResult};
use blend_importer::services::blender;
use blend_importer::ui::{
    AssetRecord, AssetStore, CopyImporter, TerminalOptionsPrompt, TerminalUnresponsivePrompt,
    spawn_progress_listener,
};
use blend_importer::{APP_NAME, ConfigManager, ImporterSettings, UserConfig, VERSION};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand, ValueEnum};
use std::process::ExitCode;
use std::thread::JoinHandle;
use tokio::runtime::Runtime;

/// Import .blend files through Blender's FBX exporter
#[derive(Parser)]
#[command(name = "blend-importer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding `BlendImporter Settings.yaml`
    #[arg(long, global = true, default_value = "BlendImporter Data")]
    config_dir: Utf8PathBuf,

    /// Directory imported assets are written to
    #[arg(long, global = true, default_value = "Content")]
    content_dir: Utf8PathBuf,

    /// Directory for rotating log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: String,

    /// Debug-level logging
    #[arg(long, global = true)]
    debug: bool,

    /// Accept default options and keep waiting on slow Blender runs without asking
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the collections, material issues and packed-data flag of a .blend file
    Analyse {
        /// Path to the .blend file
        source: Utf8PathBuf,
    },

    /// Import a .blend file as a new asset
    Import {
        /// Path to the .blend file
        source: Utf8PathBuf,

        /// Asset name (default: the file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// Kind of asset to create
        #[arg(short, long, value_enum, default_value_t = KindArg::StaticMesh)]
        kind: KindArg,
    },

    /// Reimport assets from their recorded .blend sources
    Reimport {
        /// Asset names
        #[arg(required_unless_present = "all")]
        names: Vec<String>,

        /// Reimport every asset imported from a .blend file
        #[arg(long, conflicts_with = "names")]
        all: bool,
    },

    /// Open the .blend sources of assets in Blender
    Open {
        /// Asset names
        #[arg(required_unless_present = "all")]
        names: Vec<String>,

        /// Open the sources of every asset
        #[arg(long, conflicts_with = "names")]
        all: bool,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the current settings
    Show,

    /// Set the path to the Blender executable
    SetBlender {
        /// Path to blender (not blender-launcher)
        path: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    StaticMesh,
    SkeletalMesh,
    Animation,
}

impl From<KindArg> for AssetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::StaticMesh => AssetKind::StaticMesh,
            KindArg::SkeletalMesh => AssetKind::SkeletalMesh,
            KindArg::Animation => AssetKind::Animation,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let user_config = config_manager.load_user_config()?;

    let debug = cli.debug || user_config.settings.debug_mode;
    let _log_guard =
        blend_importer::logging::setup_logging_with_console(&cli.log_dir, APP_NAME, debug, debug)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let code = match &cli.command {
        Commands::Config { command } => run_config(command, &config_manager, user_config)?,
        Commands::Analyse { source } => {
            let runtime = build_runtime()?;
            run_analyse(&runtime, &cli, user_config.settings, source)?
        }
        Commands::Import { source, name, kind } => {
            let runtime = build_runtime()?;
            run_import(
                &runtime,
                &cli,
                user_config.settings,
                source,
                name.as_deref(),
                (*kind).into(),
            )?
        }
        Commands::Reimport { names, all } => {
            let runtime = build_runtime()?;
            run_reimport(&runtime, &cli, user_config.settings, names, *all)?
        }
        Commands::Open { names, all } => run_open(&cli, &user_config.settings, names, *all)?,
    };

    tracing::info!("Shutdown complete");
    Ok(code)
}

fn build_runtime() -> Result<Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("blend-importer-worker")
        .build()
        .context("Failed to create tokio runtime")?;
    tracing::debug!("Tokio runtime initialized");
    Ok(runtime)
}

fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf> {
    let absolute = std::path::absolute(path.as_std_path())
        .with_context(|| format!("Failed to resolve {}", path))?;
    Utf8PathBuf::from_path_buf(absolute)
        .map_err(|p| anyhow::anyhow!("Path is not valid UTF-8: {}", p.display()))
}

fn run_analyse(
    runtime: &Runtime,
    cli: &Cli,
    settings: ImporterSettings,
    source: &Utf8Path,
) -> Result<ExitCode> {
    let source = absolute(source)?;
    let orchestrator = ImportOrchestrator::new(settings)?;
    let mut unresponsive = TerminalUnresponsivePrompt::stdio(cli.yes);

    let analysis = runtime.block_on(orchestrator.analyse(&source, &mut unresponsive))?;

    println!("Collections:");
    for collection in &analysis.collections {
        println!("  {}", collection);
    }
    if analysis.has_material_warnings() {
        println!("Material issues:");
        print!("{}", analysis.material_warning_text());
    }
    println!("Packed data: {}", if analysis.is_packed { "yes" } else { "no" });

    Ok(ExitCode::SUCCESS)
}

fn run_import(
    runtime: &Runtime,
    cli: &Cli,
    settings: ImporterSettings,
    source: &Utf8Path,
    name: Option<&str>,
    kind: AssetKind,
) -> Result<ExitCode> {
    let source = absolute(source)?;
    let request = match name {
        Some(name) => ImportRequest::new(source, name),
        None => ImportRequest::for_source(source),
    };

    let mut store = AssetStore::open(&cli.content_dir)?;
    let mut orchestrator = ImportOrchestrator::new(settings)?;
    let progress = spawn_progress_listener(orchestrator.state());

    let mut prompt = TerminalOptionsPrompt::stdio(cli.yes);
    let mut unresponsive = TerminalUnresponsivePrompt::stdio(cli.yes);
    let mut importer = CopyImporter::new(store.content_dir(), kind);
    let mut host = ImportHost {
        options_prompt: &mut prompt,
        unresponsive_prompt: &mut unresponsive,
        importer: &mut importer,
    };

    // An asset already imported under this name keeps its stored options
    let existing = store.existing(&request.asset_name);
    let result = runtime.block_on(orchestrator.import(&request, existing, &mut host));
    finish_progress(orchestrator, progress);

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) if e.is_cancelled() => {
            eprintln!("Import cancelled");
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e.into()),
    };

    if outcome.surface_diagnostics {
        for diagnostic in &outcome.diagnostics {
            eprintln!("\n{}\n", diagnostic);
        }
    }

    store.record_imported(&outcome.objects);
    store.save()?;

    println!(
        "Imported {} ({} assets, options {})",
        request.source,
        outcome.objects.iter().count(),
        outcome.options
    );
    Ok(ExitCode::SUCCESS)
}

fn run_reimport(
    runtime: &Runtime,
    cli: &Cli,
    settings: ImporterSettings,
    names: &[String],
    all: bool,
) -> Result<ExitCode> {
    let mut store = AssetStore::open(&cli.content_dir)?;

    let targets: Vec<AssetRecord> = if all {
        store
            .records()
            .filter(|record| assets::can_reimport(*record).is_some())
            .cloned()
            .collect()
    } else {
        let mut targets = Vec::with_capacity(names.len());
        for name in names {
            let Some(record) = store.get(name) else {
                bail!("No asset named '{}' in {}", name, store.content_dir());
            };
            targets.push(record.clone());
        }
        targets
    };

    if targets.is_empty() {
        println!("Nothing to reimport");
        return Ok(ExitCode::SUCCESS);
    }

    // One orchestrator for the batch so unchanged sources skip the export
    let mut orchestrator = ImportOrchestrator::new(settings)?;
    let progress = spawn_progress_listener(orchestrator.state());
    let mut prompt = TerminalOptionsPrompt::stdio(cli.yes);
    let mut unresponsive = TerminalUnresponsivePrompt::stdio(cli.yes);

    let mut failed = 0usize;
    let mut cancelled = 0usize;

    for mut record in targets {
        let mut importer = CopyImporter::new(store.content_dir(), record.kind());
        let mut host = ImportHost {
            options_prompt: &mut prompt,
            unresponsive_prompt: &mut unresponsive,
            importer: &mut importer,
        };

        match runtime.block_on(orchestrator.reimport(&mut record, &mut host)) {
            ReimportResult::Succeeded => {
                println!("Reimported {}", record.name());
                store.upsert(record);
            }
            ReimportResult::Cancelled => {
                println!("Reimport of {} cancelled", record.name());
                cancelled += 1;
            }
            ReimportResult::Failed => {
                eprintln!("Reimport of {} failed", record.name());
                failed += 1;
            }
        }
    }

    finish_progress(orchestrator, progress);
    store.save()?;

    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else if cancelled > 0 {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

/// Log the run summary, close the state channel and wait for the listener to drain it
fn finish_progress(orchestrator: ImportOrchestrator, progress: JoinHandle<()>) {
    orchestrator.metrics().log_summary();
    drop(orchestrator);
    if progress.join().is_err() {
        tracing::warn!("Progress listener panicked");
    }
}

fn run_open(
    cli: &Cli,
    settings: &ImporterSettings,
    names: &[String],
    all: bool,
) -> Result<ExitCode> {
    let store = AssetStore::open(&cli.content_dir)?;

    let selection: Vec<&AssetRecord> = if all {
        store.records().collect()
    } else {
        names.iter().filter_map(|name| store.get(name)).collect()
    };

    let sources = assets::collect_blend_sources(
        selection
            .iter()
            .map(|record| *record as &dyn SourceTrackedAsset),
    );
    if sources.is_empty() {
        bail!("None of the selected assets were imported from a .blend file");
    }

    let blender = blender::resolve_blender_executable(settings)?;
    for source in &sources {
        blender::open_in_blender(&blender, source)
            .with_context(|| format!("Failed to launch {} for {}", blender, source))?;
    }

    Ok(ExitCode::SUCCESS)
}

fn run_config(
    command: &ConfigCommands,
    config_manager: &ConfigManager,
    mut user_config: UserConfig,
) -> Result<ExitCode> {
    match command {
        ConfigCommands::Show => {
            let yaml = serde_yaml_ng::to_string(&user_config)
                .context("Failed to serialize user config to YAML")?;
            println!("# {}", config_manager.user_config_path());
            print!("{}", yaml);

            match blender::resolve_blender_executable(&user_config.settings) {
                Ok(path) => println!("# Blender resolves to {}", path),
                Err(e) => println!("# {}", e),
            }
        }
        ConfigCommands::SetBlender { path } => {
            let sanitized = blend_importer::models::config::sanitize_blender_path(path);
            if !blender::is_blender_executable(Utf8Path::new(&sanitized)) {
                bail!(
                    "'{}' is not a Blender executable (expected blender{})",
                    sanitized,
                    std::env::consts::EXE_SUFFIX
                );
            }
            if !Utf8Path::new(&sanitized).is_file() {
                tracing::warn!("{} does not exist yet", sanitized);
            }

            user_config.settings.blender_executable = sanitized;
            config_manager.save_user_config(&user_config)?;
            println!("Blender Executable set to {}", user_config.settings.blender_executable);
        }
    }

    Ok(ExitCode::SUCCESS)
}
