use std::time::Duration;

use tracing::{debug, warn};

use crate::app::daemon::protocol::{DaemonCommand, GameUpdate, LogLevel, ProfileMode};
use crate::app::daemon::reply::{parse_reply, DaemonReply};
use crate::app::daemon::transport::DaemonTransport;
use crate::app::error::AppError;
use crate::app::models::{DaemonAck, DaemonStatus, ForegroundProcess, GameProfile};
use crate::app::shell::executor::{DEFAULT_TIMEOUT, LIST_TIMEOUT};

pub struct DaemonClient<T> {
    transport: T,
    default_timeout: Duration,
    list_timeout: Duration,
}

impl<T: DaemonTransport> DaemonClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            default_timeout: DEFAULT_TIMEOUT,
            list_timeout: LIST_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, default_timeout: Duration, list_timeout: Duration) -> Self {
        self.default_timeout = default_timeout;
        self.list_timeout = list_timeout;
        self
    }

    /// Sends one command. `ERR` replies come back as `DaemonRejected`.
    pub fn request(&self, command: &DaemonCommand, trace_id: &str) -> Result<DaemonReply, AppError> {
        command
            .validate()
            .map_err(|message| AppError::validation(message, trace_id))?;

        let timeout = if command.is_list_query() {
            self.list_timeout
        } else {
            self.default_timeout
        };
        let line = command.to_line();
        debug!(trace_id = %trace_id, command = %line, "daemon request");

        let raw = self.transport.send(&line, timeout, trace_id)?;
        match parse_reply(&raw) {
            DaemonReply::Rejected(detail) => {
                warn!(trace_id = %trace_id, command = %line, detail = %detail, "daemon rejected command");
                Err(AppError::daemon(
                    format!("{} rejected: {detail}", command.verb()),
                    trace_id,
                ))
            }
            reply => Ok(reply),
        }
    }

    pub fn status(&self, trace_id: &str) -> Result<DaemonStatus, AppError> {
        let reply = self.request(&DaemonCommand::Status, trace_id)?;
        parse_status(&reply, trace_id)
    }

    /// True when the daemon answered `PONG`. Any failure counts as not alive.
    pub fn ping(&self, trace_id: &str) -> bool {
        match self.request(&DaemonCommand::Ping, trace_id) {
            Ok(DaemonReply::Text(text)) => text.contains("PONG"),
            Ok(DaemonReply::Ack { verb, .. }) => verb == "PONG",
            Ok(other) => {
                debug!(trace_id = %trace_id, reply = ?other, "unexpected PING reply");
                false
            }
            Err(err) => {
                debug!(trace_id = %trace_id, error = %err, "PING failed");
                false
            }
        }
    }

    /// Raw `pm list packages` style output as relayed by the daemon.
    pub fn list_packages(&self, trace_id: &str) -> Result<String, AppError> {
        let reply = self.request(&DaemonCommand::ListPackages, trace_id)?;
        if reply == DaemonReply::Empty {
            return Ok(String::new());
        }
        reply.text().map(str::to_string).ok_or_else(|| {
            AppError::parse(format!("Unexpected LIST_PACKAGES reply: {reply:?}"), trace_id)
        })
    }

    /// Reads `PKG=<package|None> PID=<pid|None>`.
    pub fn foreground_pid(&self, trace_id: &str) -> Result<ForegroundProcess, AppError> {
        let reply = self.request(&DaemonCommand::GetPid, trace_id)?;
        if !matches!(reply, DaemonReply::Record(_)) {
            return Err(AppError::parse(
                format!("Unexpected GET_PID reply: {reply:?}"),
                trace_id,
            ));
        }
        let field = |key: &str| reply.record_value(key).filter(|value| *value != "None");
        Ok(ForegroundProcess {
            package: field("PKG").map(str::to_string),
            pid: field("PID").and_then(|value| value.parse::<u32>().ok()),
        })
    }

    /// Sends a control verb whose only answer is `OK <VERB> [detail]`.
    fn acknowledged(&self, command: DaemonCommand, trace_id: &str) -> Result<DaemonAck, AppError> {
        match self.request(&command, trace_id)? {
            DaemonReply::Ack { verb, detail } => Ok(DaemonAck { verb, detail }),
            other => Err(AppError::parse(
                format!("Unexpected {} reply: {other:?}", command.verb()),
                trace_id,
            )),
        }
    }

    pub fn enable(&self, trace_id: &str) -> Result<DaemonAck, AppError> {
        self.acknowledged(DaemonCommand::Enable, trace_id)
    }

    pub fn disable(&self, trace_id: &str) -> Result<DaemonAck, AppError> {
        self.acknowledged(DaemonCommand::Disable, trace_id)
    }

    /// Detail carries the number of profiles the daemon loaded.
    pub fn reload(&self, trace_id: &str) -> Result<DaemonAck, AppError> {
        self.acknowledged(DaemonCommand::Reload, trace_id)
    }

    pub fn set_fps(&self, fps: u32, trace_id: &str) -> Result<DaemonAck, AppError> {
        self.acknowledged(DaemonCommand::SetFps(fps), trace_id)
    }

    pub fn set_profile(&self, mode: ProfileMode, trace_id: &str) -> Result<DaemonAck, AppError> {
        self.acknowledged(DaemonCommand::SetProfile(mode), trace_id)
    }

    pub fn inject(&self, package: &str, trace_id: &str) -> Result<DaemonAck, AppError> {
        self.acknowledged(DaemonCommand::Inject(package.trim().to_string()), trace_id)
    }

    pub fn clear_inject(&self, trace_id: &str) -> Result<DaemonAck, AppError> {
        self.acknowledged(DaemonCommand::ClearInject, trace_id)
    }

    pub fn game_list(&self, trace_id: &str) -> Result<Vec<GameProfile>, AppError> {
        self.request(&DaemonCommand::GetGameList, trace_id)?
            .decode_json(trace_id)
    }

    pub fn add_game(&self, package: &str, trace_id: &str) -> Result<DaemonReply, AppError> {
        self.request(&DaemonCommand::AddGame(package.to_string()), trace_id)
    }

    pub fn update_game(
        &self,
        package: &str,
        update: GameUpdate,
        trace_id: &str,
    ) -> Result<DaemonReply, AppError> {
        self.request(
            &DaemonCommand::UpdateGame(package.to_string(), update),
            trace_id,
        )
    }

    pub fn remove_game(&self, package: &str, trace_id: &str) -> Result<DaemonReply, AppError> {
        self.request(&DaemonCommand::RemoveGame(package.to_string()), trace_id)
    }

    pub fn current_fps(&self, trace_id: &str) -> Result<u32, AppError> {
        let reply = self.request(&DaemonCommand::GetFps, trace_id)?;
        reply
            .record_value("FPS")
            .and_then(|value| value.trim().parse::<u32>().ok())
            .ok_or_else(|| AppError::parse(format!("Unexpected GET_FPS reply: {reply:?}"), trace_id))
    }

    pub fn supported_rates(&self, trace_id: &str) -> Result<Vec<u32>, AppError> {
        self.request(&DaemonCommand::GetSupportedRates, trace_id)?
            .decode_json(trace_id)
    }

    pub fn set_log_level(&self, level: LogLevel, trace_id: &str) -> Result<DaemonReply, AppError> {
        self.request(&DaemonCommand::SetLog(level), trace_id)
    }
}

/// Reads `ENABLED=<bool> PACKAGES=<n> OVERRIDE=<text> LOG_LEVEL=<level>`.
pub fn parse_status(reply: &DaemonReply, trace_id: &str) -> Result<DaemonStatus, AppError> {
    if !matches!(reply, DaemonReply::Record(_)) {
        return Err(AppError::parse(
            format!("Unexpected STATUS reply: {reply:?}"),
            trace_id,
        ));
    }
    let override_package = reply
        .record_value("OVERRIDE")
        .map(|value| value.trim_start_matches("Some(").trim_end_matches(')'))
        .map(|value| value.trim_matches('"'))
        .filter(|value| !value.is_empty() && *value != "None")
        .map(str::to_string);

    Ok(DaemonStatus {
        enabled: reply
            .record_value("ENABLED")
            .and_then(|value| value.parse::<bool>().ok()),
        packages: reply
            .record_value("PACKAGES")
            .and_then(|value| value.parse::<u32>().ok()),
        override_package,
        log_level: reply
            .record_value("LOG_LEVEL")
            .and_then(|value| value.parse::<LogLevel>().ok()),
    })
}
