use serde::{Deserialize, Serialize};

use crate::app::daemon::protocol::LogLevel;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandResponse<T> {
    pub trace_id: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TargetFps {
    Single(u32),
    Array(Vec<u32>),
}

/// One entry of the daemon's game list. Extra fields sent by newer daemons are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameProfile {
    pub package: String,
    #[serde(default)]
    pub cpu_governor: String,
    #[serde(default)]
    pub enable_dnd: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_fps: Option<TargetFps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PackageSource {
    Daemon,
    PackageManager,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageListing {
    pub packages: Vec<String>,
    pub source: PackageSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DaemonStatus {
    pub enabled: Option<bool>,
    pub packages: Option<u32>,
    pub override_package: Option<String>,
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GovernorSource {
    Sysfs,
    Cached,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GovernorSet {
    pub governors: Vec<String>,
    pub source: GovernorSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonProcess {
    pub running: bool,
    pub pid: Option<u32>,
}

/// `GET_PID`: the package the daemon is tracking in the foreground, if any.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForegroundProcess {
    pub package: Option<String>,
    pub pid: Option<u32>,
}

/// `OK <VERB> [detail]` from a control verb.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonAck {
    pub verb: String,
    pub detail: Option<String>,
}

/// Where collected logs ended up. `archived` is false when only the directory exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogExport {
    pub path: String,
    pub archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemInfo {
    pub module_version: Option<String>,
    pub module_version_code: Option<String>,
    pub profile: Option<String>,
    pub kernel: Option<String>,
    pub chipset: Option<String>,
    pub codename: Option<String>,
    pub sdk: Option<String>,
    pub daemon: DaemonProcess,
    pub collected_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_profile_accepts_single_and_array_fps() {
        let profiles: Vec<GameProfile> = serde_json::from_value(serde_json::json!([
            {"package": "com.a", "cpu_governor": "performance", "enable_dnd": true, "target_fps": 90},
            {"package": "com.b", "cpu_governor": "schedutil", "enable_dnd": false,
             "target_fps": [60, 120], "refresh_rate": 120, "mode": "balance", "future": 1}
        ]))
        .expect("profiles");

        assert_eq!(profiles[0].target_fps, Some(TargetFps::Single(90)));
        assert_eq!(profiles[1].target_fps, Some(TargetFps::Array(vec![60, 120])));
        assert_eq!(profiles[1].refresh_rate, Some(120));
        assert_eq!(profiles[1].mode.as_deref(), Some("balance"));
    }

    #[test]
    fn game_profile_defaults_missing_fields() {
        let profile: GameProfile =
            serde_json::from_value(serde_json::json!({"package": "com.a"})).expect("profile");
        assert_eq!(profile.cpu_governor, "");
        assert!(!profile.enable_dnd);
        assert_eq!(profile.target_fps, None);
    }
}
