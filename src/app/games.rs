//! Per-package game profile lifecycle.
//!
//! The daemon owns the profile store; the panel only mirrors it after each `GET_GAMELIST`.
//! Enabling an unmanaged package takes two requests (`ADD_GAME`, then `UPDATE_GAME`). They are
//! not atomic: if the second one never lands, the package stays managed with the daemon's
//! default governor until the next save. The list is re-read after every attempt, so the panel
//! shows that half-applied state.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::daemon::{DaemonClient, DaemonCommand, DaemonTransport, GameUpdate};
use crate::app::error::{AppError, ErrorKind};
use crate::app::models::GameProfile;
use crate::app::paths::validate_package_name;

pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileState {
    Unmanaged,
    Managed,
}

/// What the per-app dialog asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRequest {
    pub package: String,
    pub enabled: bool,
    pub governor: String,
    pub enable_dnd: bool,
    #[serde(default)]
    pub target_fps: Option<u32>,
    #[serde(default)]
    pub refresh_rate: Option<u32>,
    #[serde(default)]
    pub mode: Option<String>,
}

impl ProfileRequest {
    pub fn enable(package: impl Into<String>, governor: impl Into<String>, enable_dnd: bool) -> Self {
        Self {
            package: package.into(),
            enabled: true,
            governor: governor.into(),
            enable_dnd,
            target_fps: None,
            refresh_rate: None,
            mode: None,
        }
    }

    pub fn disable(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            enabled: false,
            governor: String::new(),
            enable_dnd: false,
            target_fps: None,
            refresh_rate: None,
            mode: None,
        }
    }

    fn update(&self) -> GameUpdate {
        GameUpdate {
            governor: Some(self.governor.trim().to_string()),
            enable_dnd: Some(self.enable_dnd),
            target_fps: self.target_fps,
            fps_array: None,
            refresh_rate: self.refresh_rate,
            mode: self.mode.clone(),
        }
    }
}

pub fn find_profile<'a>(active: &'a [GameProfile], package: &str) -> Option<&'a GameProfile> {
    active.iter().find(|profile| profile.package == package)
}

pub fn profile_state(active: &[GameProfile], package: &str) -> ProfileState {
    if find_profile(active, package).is_some() {
        ProfileState::Managed
    } else {
        ProfileState::Unmanaged
    }
}

/// Commands for one transition, in the order they must be sent.
pub fn plan_transition(current: ProfileState, request: &ProfileRequest) -> Vec<DaemonCommand> {
    let package = request.package.trim().to_string();
    match (request.enabled, current) {
        (true, ProfileState::Unmanaged) => vec![
            DaemonCommand::AddGame(package.clone()),
            DaemonCommand::UpdateGame(package, request.update()),
        ],
        (true, ProfileState::Managed) => vec![DaemonCommand::UpdateGame(package, request.update())],
        (false, _) => vec![DaemonCommand::RemoveGame(package)],
    }
}

/// `ERR` replies to ADD/REMOVE only mean the daemon already is where we want it.
fn absorbs_rejection(command: &DaemonCommand) -> bool {
    matches!(
        command,
        DaemonCommand::AddGame(_) | DaemonCommand::RemoveGame(_)
    )
}

/// Mirrors the daemon's game list. Failures yield an empty list.
pub fn load_active_games<T: DaemonTransport>(
    daemon: &DaemonClient<T>,
    trace_id: &str,
) -> Vec<GameProfile> {
    match daemon.game_list(trace_id) {
        Ok(games) => games,
        Err(err) => {
            warn!(trace_id = %trace_id, error = %err, "failed to load active games");
            Vec::new()
        }
    }
}

/// Sends the transition for `request`, waits `settle_delay`, then re-reads the game list into
/// `active`. The re-read happens even when a command failed; that failure is returned after it.
pub fn apply_profile<T: DaemonTransport>(
    daemon: &DaemonClient<T>,
    active: &mut Vec<GameProfile>,
    request: &ProfileRequest,
    settle_delay: Duration,
    trace_id: &str,
) -> Result<(), AppError> {
    validate_package_name(&request.package)
        .map_err(|message| AppError::validation(message, trace_id))?;

    let current = profile_state(active.as_slice(), request.package.trim());
    let mut failure = None;
    for command in plan_transition(current, request) {
        match daemon.request(&command, trace_id) {
            Ok(_) => {}
            Err(err) if err.kind == ErrorKind::DaemonRejected && absorbs_rejection(&command) => {
                warn!(
                    trace_id = %trace_id,
                    command = %command,
                    error = %err,
                    "daemon rejected an idempotent profile command, continuing"
                );
            }
            Err(err) => {
                warn!(trace_id = %trace_id, command = %command, error = %err, "profile command failed");
                failure = Some(err);
                break;
            }
        }
    }
    if failure.is_none() {
        info!(
            trace_id = %trace_id,
            package = %request.package,
            enabled = request.enabled,
            "game profile saved"
        );
    }

    if !settle_delay.is_zero() {
        std::thread::sleep(settle_delay);
    }
    *active = load_active_games(daemon, trace_id);
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn managed(package: &str) -> GameProfile {
        GameProfile {
            package: package.to_string(),
            cpu_governor: "performance".to_string(),
            enable_dnd: false,
            target_fps: None,
            refresh_rate: None,
            mode: None,
        }
    }

    #[test]
    fn enabling_unmanaged_package_adds_then_updates() {
        let plan = plan_transition(
            ProfileState::Unmanaged,
            &ProfileRequest::enable("com.a", "performance", true),
        );
        let lines = plan.iter().map(DaemonCommand::to_line).collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                "ADD_GAME com.a".to_string(),
                "UPDATE_GAME com.a gov=performance dnd=true".to_string()
            ]
        );
    }

    #[test]
    fn updating_managed_package_only_updates() {
        let plan = plan_transition(
            ProfileState::Managed,
            &ProfileRequest::enable("com.a", "schedutil", false),
        );
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].to_line(), "UPDATE_GAME com.a gov=schedutil dnd=false");
    }

    #[test]
    fn disabling_always_removes() {
        for state in [ProfileState::Managed, ProfileState::Unmanaged] {
            let plan = plan_transition(state, &ProfileRequest::disable("com.a"));
            assert_eq!(plan, vec![DaemonCommand::RemoveGame("com.a".to_string())]);
        }
    }

    #[test]
    fn profile_state_follows_active_list() {
        let active = vec![managed("com.a")];
        assert_eq!(profile_state(&active, "com.a"), ProfileState::Managed);
        assert_eq!(profile_state(&active, "com.b"), ProfileState::Unmanaged);
    }

    #[test]
    fn request_extras_flow_into_update() {
        let mut request = ProfileRequest::enable("com.a", "performance", false);
        request.target_fps = Some(90);
        request.refresh_rate = Some(120);
        let plan = plan_transition(ProfileState::Managed, &request);
        assert_eq!(
            plan[0].to_line(),
            "UPDATE_GAME com.a gov=performance dnd=false fps=90 rate=120"
        );
    }
}
