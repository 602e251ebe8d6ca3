use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::daemon::TransportKind;
use crate::app::error::AppError;
use crate::app::paths::{CONFIG_DIR, DAEMON_LOG_PATH, LOG_EXPORT_DIR, MODULE_DIR, SOCKET_PATH};

/// The panel's own settings. Not to be confused with the daemon's `settings.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PanelConfig {
    pub socket_path: String,
    pub config_dir: String,
    pub module_dir: String,
    pub daemon_log: String,
    pub log_export_dir: String,
    pub shell: String,
    pub transport: TransportKind,
    pub default_timeout_ms: u64,
    pub list_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub log_level: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            socket_path: SOCKET_PATH.to_string(),
            config_dir: CONFIG_DIR.to_string(),
            module_dir: MODULE_DIR.to_string(),
            daemon_log: DAEMON_LOG_PATH.to_string(),
            log_export_dir: LOG_EXPORT_DIR.to_string(),
            shell: "sh".to_string(),
            transport: TransportKind::ShellPipe,
            default_timeout_ms: 5_000,
            list_timeout_ms: 10_000,
            settle_delay_ms: 500,
            log_level: "info".to_string(),
        }
    }
}

impl PanelConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_millis(self.list_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn settings_file(&self) -> PathBuf {
        crate::app::paths::settings_path(Path::new(&self.config_dir))
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("AURIYA_PANEL_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".auriya_panel.json")
}

pub fn backup_config_path(path: &Path) -> PathBuf {
    path.with_extension("backup.json")
}

pub fn load_config(trace_id: &str) -> Result<PanelConfig, AppError> {
    load_config_from_path(&config_path(), trace_id)
}

/// Writes `config` to [`config_path`], keeping the previous file as a backup.
pub fn save_config(config: &PanelConfig, trace_id: &str) -> Result<PathBuf, AppError> {
    let path = config_path();
    save_config_to_path(config, &path, trace_id)?;
    Ok(path)
}

pub fn load_config_from_path(path: &Path, trace_id: &str) -> Result<PanelConfig, AppError> {
    if !path.exists() {
        return Ok(PanelConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::execution(format!("Failed to read config: {err}"), trace_id))?;
    let config: PanelConfig = serde_json::from_str(&raw)
        .map_err(|err| AppError::parse(format!("Failed to parse config: {err}"), trace_id))?;
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &PanelConfig,
    path: &Path,
    trace_id: &str,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_config_path(path));
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AppError::parse(format!("Failed to serialize config: {err}"), trace_id))?;
    fs::write(path, payload)
        .map_err(|err| AppError::execution(format!("Failed to write config: {err}"), trace_id))?;
    Ok(())
}

fn validate_config(mut config: PanelConfig) -> PanelConfig {
    let defaults = PanelConfig::default();
    if !(100..=60_000).contains(&config.default_timeout_ms) {
        config.default_timeout_ms = defaults.default_timeout_ms;
    }
    if !(100..=120_000).contains(&config.list_timeout_ms) {
        config.list_timeout_ms = defaults.list_timeout_ms;
    }
    if config.settle_delay_ms > 10_000 {
        config.settle_delay_ms = defaults.settle_delay_ms;
    }
    if config.socket_path.trim().is_empty() {
        config.socket_path = defaults.socket_path;
    }
    if config.config_dir.trim().is_empty() {
        config.config_dir = defaults.config_dir;
    }
    if config.module_dir.trim().is_empty() {
        config.module_dir = defaults.module_dir;
    }
    if config.daemon_log.trim().is_empty() {
        config.daemon_log = defaults.daemon_log;
    }
    if config.log_export_dir.trim().is_empty() {
        config.log_export_dir = defaults.log_export_dir;
    }
    if config.shell.trim().is_empty() {
        config.shell = defaults.shell;
    }
    if config.log_level.trim().is_empty() {
        config.log_level = defaults.log_level;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from_path(&dir.path().join("none.json"), "t").expect("config");
        assert_eq!(config, PanelConfig::default());
        assert_eq!(
            config.settings_file(),
            PathBuf::from("/data/adb/.config/auriya/settings.toml")
        );
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("panel.json");
        fs::write(&path, r#"{"socket_path": "/tmp/a.sock", "transport": "unix_socket"}"#)
            .expect("write");
        let config = load_config_from_path(&path, "t").expect("config");
        assert_eq!(config.socket_path, "/tmp/a.sock");
        assert_eq!(config.transport, TransportKind::UnixSocket);
        assert_eq!(config.list_timeout_ms, 10_000);
    }

    #[test]
    fn clamps_invalid_values() {
        let config = PanelConfig {
            default_timeout_ms: 0,
            list_timeout_ms: 1_000_000,
            settle_delay_ms: 99_999,
            shell: " ".to_string(),
            log_export_dir: String::new(),
            ..PanelConfig::default()
        };
        let validated = validate_config(config);
        assert_eq!(validated.default_timeout_ms, 5_000);
        assert_eq!(validated.list_timeout_ms, 10_000);
        assert_eq!(validated.settle_delay_ms, 500);
        assert_eq!(validated.shell, "sh");
        assert_eq!(validated.log_export_dir, "/sdcard/Download/AuriyaLogs");
    }

    #[test]
    fn save_keeps_a_backup_of_the_previous_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("panel.json");
        save_config_to_path(&PanelConfig::default(), &path, "t").expect("first save");
        let changed = PanelConfig {
            settle_delay_ms: 0,
            ..PanelConfig::default()
        };
        save_config_to_path(&changed, &path, "t").expect("second save");

        let backup = load_config_from_path(&backup_config_path(&path), "t").expect("backup");
        assert_eq!(backup.settle_delay_ms, 500);
        let current = load_config_from_path(&path, "t").expect("current");
        assert_eq!(current.settle_delay_ms, 0);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("panel.json");
        fs::write(&path, "{not json").expect("write");
        let err = load_config_from_path(&path, "t-bad").expect_err("parse error");
        assert_eq!(err.code, "ERR_PARSE");
    }
}
