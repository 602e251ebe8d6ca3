use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

pub const SOCKET_PATH: &str = "/dev/socket/auriya.sock";
pub const CONFIG_DIR: &str = "/data/adb/.config/auriya";
pub const MODULE_DIR: &str = "/data/adb/modules/auriya";
pub const DAEMON_LOG_PATH: &str = "/data/adb/auriya/daemon.log";
pub const LOG_EXPORT_DIR: &str = "/sdcard/Download/AuriyaLogs";

pub const SETTINGS_FILE_NAME: &str = "settings.toml";
pub const CURRENT_PROFILE_FILE_NAME: &str = "current_profile";
pub const MODULE_PROP_FILE_NAME: &str = "module.prop";

pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SETTINGS_FILE_NAME)
}

pub fn current_profile_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CURRENT_PROFILE_FILE_NAME)
}

pub fn module_prop_path(module_dir: &Path) -> PathBuf {
    module_dir.join(MODULE_PROP_FILE_NAME)
}

/// Single-quotes `value` for POSIX `sh`, escaping embedded single quotes.
pub fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

pub fn validate_package_name(package: &str) -> Result<(), String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)+$").expect("package name regex")
    });
    let trimmed = package.trim();
    if trimmed.is_empty() {
        return Err("package is required".to_string());
    }
    if !pattern.is_match(trimmed) {
        return Err(format!("invalid package name: {trimmed}"));
    }
    Ok(())
}

/// Governor names end up unquoted inside daemon lines and sysfs writes.
pub fn validate_governor_name(governor: &str) -> Result<(), String> {
    let trimmed = governor.trim();
    if trimmed.is_empty() {
        return Err("governor is required".to_string());
    }
    if !trimmed
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(format!("invalid governor name: {trimmed}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn validate_package_name_accepts_android_packages() {
        assert!(validate_package_name("com.example.game").is_ok());
        assert!(validate_package_name("com.a").is_ok());
        assert!(validate_package_name("com.tencent.ig_2").is_ok());
    }

    #[test]
    fn validate_package_name_rejects_shell_metacharacters() {
        assert!(validate_package_name("").is_err());
        assert!(validate_package_name("nodots").is_err());
        assert!(validate_package_name("com.a; reboot").is_err());
        assert!(validate_package_name("com.a\"").is_err());
        assert!(validate_package_name("1com.a").is_err());
    }

    #[test]
    fn validate_governor_name_rejects_spaces() {
        assert!(validate_governor_name("schedutil").is_ok());
        assert!(validate_governor_name("walt-v2").is_ok());
        assert!(validate_governor_name("perf ormance").is_err());
        assert!(validate_governor_name("x;y").is_err());
        assert!(validate_governor_name(" ").is_err());
    }

    #[test]
    fn file_paths_join_config_dirs() {
        let dir = Path::new(CONFIG_DIR);
        assert_eq!(
            settings_path(dir),
            PathBuf::from("/data/adb/.config/auriya/settings.toml")
        );
        assert_eq!(
            module_prop_path(Path::new(MODULE_DIR)),
            PathBuf::from("/data/adb/modules/auriya/module.prop")
        );
    }
}
