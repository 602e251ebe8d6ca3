use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::app::paths::{validate_governor_name, validate_package_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_wire(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileMode {
    Performance,
    Balance,
    Powersave,
}

impl ProfileMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileMode::Performance => "performance",
            ProfileMode::Balance => "balance",
            ProfileMode::Powersave => "powersave",
        }
    }
}

impl FromStr for ProfileMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "performance" => Ok(ProfileMode::Performance),
            "balance" => Ok(ProfileMode::Balance),
            "powersave" => Ok(ProfileMode::Powersave),
            other => Err(format!("unknown profile mode: {other}")),
        }
    }
}

/// Optional fields of `UPDATE_GAME`; unset fields are left alone by the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameUpdate {
    pub governor: Option<String>,
    pub enable_dnd: Option<bool>,
    pub target_fps: Option<u32>,
    pub fps_array: Option<Vec<u32>>,
    pub refresh_rate: Option<u32>,
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCommand {
    Status,
    Ping,
    GetPid,
    Enable,
    Disable,
    Reload,
    ListPackages,
    GetGameList,
    AddGame(String),
    UpdateGame(String, GameUpdate),
    RemoveGame(String),
    GetFps,
    SetFps(u32),
    GetSupportedRates,
    SetLog(LogLevel),
    SetProfile(ProfileMode),
    Inject(String),
    ClearInject,
}

impl DaemonCommand {
    pub fn verb(&self) -> &'static str {
        match self {
            DaemonCommand::Status => "STATUS",
            DaemonCommand::Ping => "PING",
            DaemonCommand::GetPid => "GET_PID",
            DaemonCommand::Enable => "ENABLE",
            DaemonCommand::Disable => "DISABLE",
            DaemonCommand::Reload => "RELOAD",
            DaemonCommand::ListPackages => "LIST_PACKAGES",
            DaemonCommand::GetGameList => "GET_GAMELIST",
            DaemonCommand::AddGame(_) => "ADD_GAME",
            DaemonCommand::UpdateGame(_, _) => "UPDATE_GAME",
            DaemonCommand::RemoveGame(_) => "REMOVE_GAME",
            DaemonCommand::GetFps => "GET_FPS",
            DaemonCommand::SetFps(_) => "SET_FPS",
            DaemonCommand::GetSupportedRates => "GET_SUPPORTED_RATES",
            DaemonCommand::SetLog(_) => "SETLOG",
            DaemonCommand::SetProfile(_) => "SET_PROFILE",
            DaemonCommand::Inject(_) => "INJECT",
            DaemonCommand::ClearInject => "CLEAR_INJECT",
        }
    }

    /// List-style verbs get the longer executor timeout.
    pub fn is_list_query(&self) -> bool {
        matches!(self, DaemonCommand::ListPackages)
    }

    /// Rejects arguments that would break the line framing or the shell pipe.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            DaemonCommand::AddGame(pkg)
            | DaemonCommand::RemoveGame(pkg)
            | DaemonCommand::Inject(pkg) => validate_package_name(pkg),
            DaemonCommand::UpdateGame(pkg, update) => {
                validate_package_name(pkg)?;
                if let Some(gov) = &update.governor {
                    validate_governor_name(gov)?;
                }
                if let Some(mode) = &update.mode {
                    validate_governor_name(mode).map_err(|_| format!("invalid mode: {mode}"))?;
                }
                if matches!(&update.fps_array, Some(values) if values.is_empty()) {
                    return Err("fps_array must not be empty".to_string());
                }
                Ok(())
            }
            DaemonCommand::SetFps(0) => Err("fps must be greater than zero".to_string()),
            _ => Ok(()),
        }
    }

    /// The newline-free protocol line for this command.
    pub fn to_line(&self) -> String {
        match self {
            DaemonCommand::AddGame(pkg)
            | DaemonCommand::RemoveGame(pkg)
            | DaemonCommand::Inject(pkg) => format!("{} {}", self.verb(), pkg.trim()),
            DaemonCommand::UpdateGame(pkg, update) => {
                let mut line = format!("{} {}", self.verb(), pkg.trim());
                if let Some(gov) = &update.governor {
                    line.push_str(&format!(" gov={}", gov.trim()));
                }
                if let Some(dnd) = update.enable_dnd {
                    line.push_str(&format!(" dnd={dnd}"));
                }
                if let Some(values) = &update.fps_array {
                    let joined = values
                        .iter()
                        .map(|value| value.to_string())
                        .collect::<Vec<_>>()
                        .join(",");
                    line.push_str(&format!(" fps_array={joined}"));
                } else if let Some(fps) = update.target_fps {
                    line.push_str(&format!(" fps={fps}"));
                }
                if let Some(rate) = update.refresh_rate {
                    line.push_str(&format!(" rate={rate}"));
                }
                if let Some(mode) = &update.mode {
                    line.push_str(&format!(" mode={}", mode.trim()));
                }
                line
            }
            DaemonCommand::SetFps(fps) => format!("{} {fps}", self.verb()),
            DaemonCommand::SetLog(level) => format!("{} {}", self.verb(), level.as_wire()),
            DaemonCommand::SetProfile(mode) => {
                format!("{} {}", self.verb(), mode.as_str().to_ascii_uppercase())
            }
            _ => self.verb().to_string(),
        }
    }
}

impl fmt::Display for DaemonCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}
