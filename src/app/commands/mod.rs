use std::path::Path;

use tracing::{info, warn};
use uuid::Uuid;

use crate::app::config::PanelConfig;
use crate::app::daemon::{DaemonClient, LogLevel, ProfileMode, Transport};
use crate::app::error::AppError;
use crate::app::games::{self, ProfileRequest};
use crate::app::governors;
use crate::app::logs;
use crate::app::models::{
    CommandResponse, DaemonAck, DaemonStatus, ForegroundProcess, GameProfile, GovernorSet,
    LogExport, PackageListing, SystemInfo,
};
use crate::app::packages;
use crate::app::settings::{self, SettingsPatch, SettingsView};
use crate::app::shell::{CommandExecutor, ShellExecutor};
use crate::app::state::PanelState;
use crate::app::system;


/// Executor, daemon client and configuration shared by every entry point.
pub struct PanelContext<E> {
    pub executor: E,
    pub daemon: DaemonClient<Transport<E>>,
    pub config: PanelConfig,
}

impl<E: CommandExecutor + Clone> PanelContext<E> {
    pub fn new(executor: E, config: PanelConfig) -> Self {
        let transport = Transport::from_kind(config.transport, executor.clone(), &config.socket_path);
        let daemon = DaemonClient::new(transport)
            .with_timeouts(config.default_timeout(), config.list_timeout());
        Self {
            executor,
            daemon,
            config,
        }
    }
}

impl PanelContext<ShellExecutor> {
    pub fn from_config(config: PanelConfig) -> Self {
        let executor = ShellExecutor::new(config.shell.clone());
        Self::new(executor, config)
    }
}

fn resolve_trace_id(input: Option<String>) -> String {
    input
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn ensure_non_empty(value: &str, field: &str, trace_id: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(
            format!("{field} is required"),
            trace_id,
        ));
    }
    Ok(())
}

pub fn load_packages<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    state: &mut PanelState,
    trace_id: Option<String>,
) -> Result<CommandResponse<PackageListing>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let listing = packages::load_packages(&ctx.daemon, &ctx.executor, &trace_id)?;
    state.packages = listing.packages.clone();
    state.package_source = Some(listing.source);
    Ok(CommandResponse {
        trace_id,
        data: listing,
    })
}

pub fn load_active_games<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    state: &mut PanelState,
    trace_id: Option<String>,
) -> Result<CommandResponse<Vec<GameProfile>>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    state.active_games = games::load_active_games(&ctx.daemon, &trace_id);
    Ok(CommandResponse {
        trace_id,
        data: state.active_games.clone(),
    })
}

pub fn save_game_profile<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    state: &mut PanelState,
    request: ProfileRequest,
    trace_id: Option<String>,
) -> Result<CommandResponse<Vec<GameProfile>>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    ensure_non_empty(&request.package, "package", &trace_id)?;
    if request.enabled {
        ensure_non_empty(&request.governor, "governor", &trace_id)?;
    }

    games::apply_profile(
        &ctx.daemon,
        &mut state.active_games,
        &request,
        ctx.config.settle_delay(),
        &trace_id,
    )?;
    Ok(CommandResponse {
        trace_id,
        data: state.active_games.clone(),
    })
}

pub fn load_settings_view<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    state: &mut PanelState,
    trace_id: Option<String>,
) -> Result<CommandResponse<SettingsView>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let document = settings::load_settings(&ctx.executor, &ctx.config.settings_file(), &trace_id);
    let live = settings::fetch_live_settings(&ctx.daemon, &trace_id);
    let view = settings::overlay_live(&document.values, &live);
    state.settings = Some(view.clone());
    Ok(CommandResponse {
        trace_id,
        data: view,
    })
}

/// Values on screen come from `state`; without a loaded view the file is read first.
pub fn save_settings<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    state: &mut PanelState,
    patch: SettingsPatch,
    trace_id: Option<String>,
) -> Result<CommandResponse<SettingsView>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let path = ctx.config.settings_file();
    let current = match &state.settings {
        Some(view) => view.values.clone(),
        None => settings::load_settings(&ctx.executor, &path, &trace_id).values,
    };
    if patch.is_empty() {
        warn!(trace_id = %trace_id, "saving settings without changes");
    }

    let written = settings::save_settings(&ctx.executor, &path, &patch, &current, &trace_id)?;
    let view = match state.settings.take() {
        Some(previous) => SettingsView {
            values: written,
            ..previous
        },
        None => SettingsView {
            values: written,
            debug_mode: false,
            supported_refresh_rates: Vec::new(),
        },
    };
    state.settings = Some(view.clone());
    Ok(CommandResponse {
        trace_id,
        data: view,
    })
}

pub fn set_debug_mode<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    state: &mut PanelState,
    enabled: bool,
    trace_id: Option<String>,
) -> Result<CommandResponse<LogLevel>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let level = if enabled { LogLevel::Debug } else { LogLevel::Info };
    ctx.daemon.set_log_level(level, &trace_id)?;
    if let Some(view) = state.settings.as_mut() {
        view.debug_mode = enabled;
    }
    info!(trace_id = %trace_id, level = ?level, "daemon log level changed");
    Ok(CommandResponse {
        trace_id,
        data: level,
    })
}

pub fn discover_governors<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    state: &mut PanelState,
    trace_id: Option<String>,
) -> Result<CommandResponse<GovernorSet>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let set = governors::discover_governors(&ctx.executor, &mut state.governors, &trace_id);
    Ok(CommandResponse {
        trace_id,
        data: set,
    })
}

pub fn set_global_governor<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    governor: String,
    trace_id: Option<String>,
) -> Result<CommandResponse<String>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    ensure_non_empty(&governor, "governor", &trace_id)?;
    governors::set_global_governor(&ctx.executor, &governor, &trace_id)?;
    Ok(CommandResponse {
        trace_id,
        data: governor.trim().to_string(),
    })
}

pub fn daemon_status<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    trace_id: Option<String>,
) -> Result<CommandResponse<DaemonStatus>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let status = ctx.daemon.status(&trace_id)?;
    Ok(CommandResponse {
        trace_id,
        data: status,
    })
}

pub fn load_system_info<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    trace_id: Option<String>,
) -> Result<CommandResponse<SystemInfo>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let info = system::load_system_info(
        &ctx.executor,
        Path::new(&ctx.config.config_dir),
        Path::new(&ctx.config.module_dir),
        &trace_id,
    );
    Ok(CommandResponse {
        trace_id,
        data: info,
    })
}

pub fn ping_daemon<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    trace_id: Option<String>,
) -> Result<CommandResponse<bool>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let alive = ctx.daemon.ping(&trace_id);
    Ok(CommandResponse {
        trace_id,
        data: alive,
    })
}

pub fn foreground_process<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    trace_id: Option<String>,
) -> Result<CommandResponse<ForegroundProcess>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let process = ctx.daemon.foreground_pid(&trace_id)?;
    Ok(CommandResponse {
        trace_id,
        data: process,
    })
}

fn acknowledge(trace_id: String, ack: DaemonAck) -> CommandResponse<DaemonAck> {
    info!(trace_id = %trace_id, verb = %ack.verb, detail = ?ack.detail, "daemon acknowledged");
    CommandResponse { trace_id, data: ack }
}

/// `ENABLE` or `DISABLE`: turns the daemon's profile switching on or off.
pub fn set_daemon_enabled<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    enabled: bool,
    trace_id: Option<String>,
) -> Result<CommandResponse<DaemonAck>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let ack = if enabled {
        ctx.daemon.enable(&trace_id)?
    } else {
        ctx.daemon.disable(&trace_id)?
    };
    Ok(acknowledge(trace_id, ack))
}

/// Makes the daemon re-read its game list from disk.
pub fn reload_profiles<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    trace_id: Option<String>,
) -> Result<CommandResponse<DaemonAck>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let ack = ctx.daemon.reload(&trace_id)?;
    Ok(acknowledge(trace_id, ack))
}

pub fn set_target_fps<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    state: &mut PanelState,
    fps: u32,
    trace_id: Option<String>,
) -> Result<CommandResponse<DaemonAck>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let ack = ctx.daemon.set_fps(fps, &trace_id)?;
    if let Some(view) = state.settings.as_mut() {
        view.values.fas.target_fps = fps;
    }
    Ok(acknowledge(trace_id, ack))
}

/// Forces a profile until the daemon's next decision.
pub fn set_profile_mode<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    mode: ProfileMode,
    trace_id: Option<String>,
) -> Result<CommandResponse<DaemonAck>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let ack = ctx.daemon.set_profile(mode, &trace_id)?;
    Ok(acknowledge(trace_id, ack))
}

/// Treats `package` as the foreground game regardless of what is on screen.
pub fn inject_package<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    package: String,
    trace_id: Option<String>,
) -> Result<CommandResponse<DaemonAck>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    ensure_non_empty(&package, "package", &trace_id)?;
    let ack = ctx.daemon.inject(&package, &trace_id)?;
    Ok(acknowledge(trace_id, ack))
}

pub fn clear_injected_package<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    trace_id: Option<String>,
) -> Result<CommandResponse<DaemonAck>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let ack = ctx.daemon.clear_inject(&trace_id)?;
    Ok(acknowledge(trace_id, ack))
}

pub fn export_logs<E: CommandExecutor + Clone>(
    ctx: &PanelContext<E>,
    trace_id: Option<String>,
) -> Result<CommandResponse<LogExport>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let export = logs::export_logs(
        &ctx.executor,
        Path::new(&ctx.config.daemon_log),
        Path::new(&ctx.config.log_export_dir),
        &trace_id,
    )?;
    Ok(CommandResponse {
        trace_id,
        data: export,
    })
}
