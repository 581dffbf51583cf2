//! Everything specific to launching Blender: locating the executable, building
//! its command line, shipping the analyse/export scripts, and the environment
//! the export script reads its options from.

use crate::models::{ImportOptions, ImporterSettings};
use crate::services::orchestrator::ImportError;
use crate::services::process::ProcessSpec;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use std::process::{Command, Stdio};
use tempfile::TempDir;

const ANALYSE_SCRIPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/blender_analyse.py"
));

const EXPORT_SCRIPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/blender_export.py"
));

pub const ENV_OUTPUT_FILE: &str = "UNREAL_IMPORTER_OUTPUT_FILE";
pub const ENV_EXPORT_OBJECT_PIVOT: &str = "UNREAL_IMPORTER_EXPORT_OBJECT_PIVOT";
pub const ENV_FIX_MATERIALS: &str = "UNREAL_IMPORTER_FIX_MATERIALS";
pub const ENV_ENABLED_COLLECTIONS: &str = "UNREAL_IMPORTER_ENABLED_COLLECTIONS";
pub const ENV_UNPACK: &str = "UNREAL_IMPORTER_UNPACK";

/// Environment variable consulted when no executable is configured
pub const BLENDER_PATH_ENV: &str = "BLENDER_PATH";

/// Extension of the interchange file produced by the export script
pub const INTERCHANGE_EXTENSION: &str = "fbx";

/// The two modes the external tool is run in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlenderScript {
    Analyse,
    Export,
}

impl BlenderScript {
    pub fn name(&self) -> &'static str {
        match self {
            BlenderScript::Analyse => "blender_analyse",
            BlenderScript::Export => "blender_export",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.py", self.name())
    }

    fn bundled_source(&self) -> &'static str {
        match self {
            BlenderScript::Analyse => ANALYSE_SCRIPT,
            BlenderScript::Export => EXPORT_SCRIPT,
        }
    }
}

/// On-disk copies of the scripts Blender is asked to run.
///
/// The bundled scripts are written to a temporary directory that lives as long
/// as this value. A script of the same file name in the override directory
/// takes precedence.
#[derive(Debug)]
pub struct ScriptSet {
    override_dir: Option<Utf8PathBuf>,
    bundled_dir: Utf8PathBuf,
    _bundled: TempDir,
}

impl ScriptSet {
    pub fn new(override_dir: Option<Utf8PathBuf>) -> io::Result<Self> {
        let bundled = tempfile::Builder::new()
            .prefix("blend_importer_scripts_")
            .tempdir()?;
        let bundled_dir = utf8_path(bundled.path().to_path_buf())?;

        for script in [BlenderScript::Analyse, BlenderScript::Export] {
            fs::write(bundled_dir.join(script.file_name()), script.bundled_source())?;
        }

        Ok(Self {
            override_dir,
            bundled_dir,
            _bundled: bundled,
        })
    }

    /// Scripts for the given settings (empty `Scripts Directory` means bundled only)
    pub fn from_settings(settings: &ImporterSettings) -> io::Result<Self> {
        let dir = settings.scripts_dir.trim();
        Self::new((!dir.is_empty()).then(|| Utf8PathBuf::from(dir)))
    }

    pub fn path(&self, script: BlenderScript) -> Utf8PathBuf {
        if let Some(dir) = &self.override_dir {
            let candidate = dir.join(script.file_name());
            if candidate.is_file() {
                return candidate;
            }
        }
        self.bundled_dir.join(script.file_name())
    }
}

/// Locate the Blender executable.
///
/// Order: configured path, then `BLENDER_PATH`, then `blender` on `PATH`.
///
/// # Errors
/// [`ImportError::Config`] if the configured path is not a Blender executable,
/// or if nothing could be found.
pub fn resolve_blender_executable(settings: &ImporterSettings) -> Result<Utf8PathBuf, ImportError> {
    let configured = settings.sanitized_blender_path();
    if !configured.is_empty() {
        let path = Utf8PathBuf::from(configured);
        if !is_blender_executable(&path) {
            return Err(ImportError::Config(format!(
                "'{}' is not a Blender executable. Set 'Blender Executable' to the path of blender{}",
                path,
                std::env::consts::EXE_SUFFIX
            )));
        }
        if !path.is_file() {
            return Err(ImportError::Config(format!(
                "Blender executable '{}' does not exist. Update 'Blender Executable' in your settings",
                path
            )));
        }
        return Ok(path);
    }

    if let Ok(from_env) = std::env::var(BLENDER_PATH_ENV) {
        let path = Utf8PathBuf::from(from_env);
        if path.is_file() {
            tracing::debug!("Using Blender from {}: {}", BLENDER_PATH_ENV, path);
            return Ok(path);
        }
        tracing::warn!("{} points at '{}', which does not exist", BLENDER_PATH_ENV, path);
    }

    if let Some(path) = which::which("blender")
        .ok()
        .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
    {
        tracing::debug!("Using Blender from PATH: {}", path);
        return Ok(path);
    }

    Err(ImportError::Config(
        "Your path to Blender is not set. Set 'Blender Executable' in your settings".to_string(),
    ))
}

/// True if the file name looks like Blender's main executable (not the launcher)
pub fn is_blender_executable(path: &Utf8Path) -> bool {
    path.file_stem()
        .is_some_and(|stem| stem.eq_ignore_ascii_case("blender"))
}

/// Command line that runs `script` against `source`
pub fn script_invocation(
    settings: &ImporterSettings,
    blender: &Utf8Path,
    source: &Utf8Path,
    script: &Utf8Path,
) -> ProcessSpec {
    let mut spec = ProcessSpec::new(blender).args(["-noaudio", "--python-exit-code", "1"]);

    if settings.debug_mode {
        spec = spec.arg("-d");
    }

    if settings.factory_startup {
        spec = spec.arg("--factory-startup");
    }

    if settings.run_in_background {
        spec = spec.arg("-b");
    } else {
        spec = spec.args(["-w", "--no-window-focus"]);
    }

    spec.arg(absolute_path(source).as_str())
        .arg("-P")
        .arg(script.as_str())
}

/// Environment variables the export script reads its configuration from
pub fn export_environment(
    output_file: &Utf8Path,
    options: &ImportOptions,
    fix_materials: bool,
    unpack: bool,
) -> Vec<(String, String)> {
    vec![
        (ENV_OUTPUT_FILE.to_string(), output_file.to_string()),
        (
            ENV_EXPORT_OBJECT_PIVOT.to_string(),
            options.use_object_pivot.to_string(),
        ),
        (ENV_FIX_MATERIALS.to_string(), fix_materials.to_string()),
        (ENV_ENABLED_COLLECTIONS.to_string(), options.collections_joined()),
        (ENV_UNPACK.to_string(), unpack.to_string()),
    ]
}

/// Where the export of `source` lands inside `interchange_dir`
pub fn interchange_path(interchange_dir: &Utf8Path, source: &Utf8Path) -> Utf8PathBuf {
    let stem = source.file_stem().unwrap_or("export");
    interchange_dir.join(format!("{}.{}", stem, INTERCHANGE_EXTENSION))
}

/// Launch Blender with `source` open, without waiting for it
pub fn open_in_blender(blender: &Utf8Path, source: &Utf8Path) -> io::Result<()> {
    tracing::info!("Opening \"{}\" in Blender...", source);
    Command::new(blender.as_std_path())
        .arg(source.as_std_path())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}

fn absolute_path(path: &Utf8Path) -> Utf8PathBuf {
    std::path::absolute(path.as_std_path())
        .ok()
        .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
        .unwrap_or_else(|| path.to_path_buf())
}

fn utf8_path(path: std::path::PathBuf) -> io::Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path).map_err(|p| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("path is not valid UTF-8: {}", p.display()),
        )
    })
}
