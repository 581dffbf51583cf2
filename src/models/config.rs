use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User configuration from `BlendImporter Settings.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(rename = "BlendImporter_Settings", default)]
    pub settings: ImporterSettings,
}

/// Settings that control how Blender is located and launched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImporterSettings {
    /// Path to the Blender executable. Empty means auto-discover.
    #[serde(rename = "Blender Executable", default)]
    pub blender_executable: String,

    /// Run Blender without its UI. Preferred, but some setups misbehave in background mode.
    #[serde(rename = "Run In Background", default = "default_true")]
    pub run_in_background: bool,

    /// Fix common Blender material problems before exporting
    #[serde(rename = "Fix Materials", default = "default_true")]
    pub fix_materials: bool,

    /// Seconds before a running Blender process is considered unresponsive
    #[serde(
        rename = "Unresponsive Warning Duration",
        default = "default_unresponsive_warning_duration"
    )]
    pub unresponsive_warning_duration: f64,

    /// Pass `-d` to Blender for extra debug output
    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,

    /// Start Blender with factory defaults (no addons, no startup scene)
    #[serde(rename = "Factory Startup", default)]
    pub factory_startup: bool,

    /// Directory holding replacement analyse/export scripts. Empty uses the bundled ones.
    #[serde(rename = "Scripts Directory", default)]
    pub scripts_dir: String,
}

impl Default for ImporterSettings {
    fn default() -> Self {
        Self {
            blender_executable: String::new(),
            run_in_background: true,
            fix_materials: true,
            unresponsive_warning_duration: default_unresponsive_warning_duration(),
            debug_mode: false,
            factory_startup: false,
            scripts_dir: String::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_unresponsive_warning_duration() -> f64 {
    15.0
}

impl ImporterSettings {
    /// Unresponsive warning duration as a [`Duration`].
    ///
    /// NaN and non-positive values fall back to the default. Values too large
    /// for a [`Duration`] saturate to [`Duration::MAX`], which never prompts.
    pub fn unresponsive_timeout(&self) -> Duration {
        let secs = self.unresponsive_warning_duration;
        if secs.is_nan() || secs <= 0.0 {
            return Duration::from_secs_f64(default_unresponsive_warning_duration());
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// The configured Blender path with registry-style decoration removed.
    ///
    /// Handles values like `"C:\Blender\blender-launcher.exe" "%1"`: trailing
    /// arguments after `.exe` are dropped, surrounding whitespace and quotes are
    /// trimmed, and the launcher is swapped for the real executable.
    pub fn sanitized_blender_path(&self) -> String {
        sanitize_blender_path(&self.blender_executable)
    }
}

/// See [`ImporterSettings::sanitized_blender_path`]
pub fn sanitize_blender_path(raw: &str) -> String {
    let mut path = raw;

    if let Some(end) = exe_suffix_end(path) {
        path = &path[..end];
    }

    let mut path = path
        .trim()
        .trim_matches('"')
        .trim()
        .to_string();

    if let Some(prefix) = path.strip_suffix("-launcher.exe") {
        tracing::info!(
            "Executable path points at blender-launcher.exe, using blender.exe instead"
        );
        path = format!("{}.exe", prefix);
    } else if let Some(prefix) = path.strip_suffix("-launcher") {
        path = prefix.to_string();
    }

    path
}

/// End of the first `.exe` that closes a path segment (end, closing quote or argument gap)
fn exe_suffix_end(path: &str) -> Option<usize> {
    let lower = path.to_ascii_lowercase();
    lower.match_indices(".exe").map(|(idx, _)| idx + 4).find(|&end| {
        lower[end..]
            .chars()
            .next()
            .is_none_or(|c| c == '"' || c.is_whitespace())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importer_settings_defaults() {
        let settings = ImporterSettings::default();
        assert!(settings.blender_executable.is_empty());
        assert!(settings.run_in_background);
        assert!(settings.fix_materials);
        assert!(!settings.debug_mode);
        assert!(!settings.factory_startup);
        assert_eq!(settings.unresponsive_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_unresponsive_timeout_rejects_nonsense() {
        let settings = ImporterSettings {
            unresponsive_warning_duration: -3.0,
            ..Default::default()
        };
        assert_eq!(settings.unresponsive_timeout(), Duration::from_secs(15));

        let settings = ImporterSettings {
            unresponsive_warning_duration: 0.5,
            ..Default::default()
        };
        assert_eq!(settings.unresponsive_timeout(), Duration::from_millis(500));

        let settings = ImporterSettings {
            unresponsive_warning_duration: f64::NAN,
            ..Default::default()
        };
        assert_eq!(settings.unresponsive_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_unresponsive_timeout_saturates_huge_values() {
        for secs in [1e19, 1e30, f64::MAX, f64::INFINITY] {
            let settings = ImporterSettings {
                unresponsive_warning_duration: secs,
                ..Default::default()
            };
            assert_eq!(settings.unresponsive_timeout(), Duration::MAX);
        }
    }

    #[test]
    fn test_sanitize_registry_value() {
        assert_eq!(
            sanitize_blender_path(r#""C:\Program Files\Blender Foundation\Blender 3.3\blender-launcher.exe" "%1""#),
            r"C:\Program Files\Blender Foundation\Blender 3.3\blender.exe"
        );
    }

    #[test]
    fn test_sanitize_plain_paths() {
        assert_eq!(sanitize_blender_path("  /usr/bin/blender  "), "/usr/bin/blender");
        assert_eq!(sanitize_blender_path("\"/opt/blender/blender\""), "/opt/blender/blender");
        assert_eq!(sanitize_blender_path("/opt/blender/blender-launcher"), "/opt/blender/blender");
        assert_eq!(sanitize_blender_path(""), "");
    }

    #[test]
    fn test_sanitize_keeps_exe_inside_directory_names() {
        assert_eq!(
            sanitize_blender_path("/opt/tools.executables/blender"),
            "/opt/tools.executables/blender"
        );
        assert_eq!(
            sanitize_blender_path(r"D:\my.exe.tools\blender.exe --background"),
            r"D:\my.exe.tools\blender.exe"
        );
        assert_eq!(sanitize_blender_path(r"C:\Blender\BLENDER.EXE"), r"C:\Blender\BLENDER.EXE");
    }

    #[test]
    fn test_user_config_yaml_defaults() {
        let config: UserConfig =
            serde_yaml_ng::from_str("BlendImporter_Settings:\n  Debug Mode: true\n").unwrap();
        assert!(config.settings.debug_mode);
        assert!(config.settings.run_in_background);
        assert_eq!(config.settings.unresponsive_warning_duration, 15.0);
    }
}
