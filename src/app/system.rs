use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use tracing::debug;

use crate::app::models::{DaemonProcess, SystemInfo};
use crate::app::paths::{current_profile_path, module_prop_path, shell_quote};
use crate::app::shell::{CommandExecutor, ExecOptions};

pub const DAEMON_PROCESS_NAME: &str = "auriya";

/// `key=value` lines; comments and blank lines are skipped, later keys win.
pub fn parse_prop_lines(output: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if !key.is_empty() {
            map.insert(key.to_string(), value.trim().to_string());
        }
    }
    map
}

pub fn profile_label(code: &str) -> Option<&'static str> {
    match code.trim() {
        "0" => Some("Init"),
        "1" => Some("Performance"),
        "2" => Some("Balance"),
        "3" => Some("Powersave"),
        _ => None,
    }
}

/// First PID printed by `pidof`, if any.
pub fn parse_pidof(output: &str) -> Option<u32> {
    output
        .split_whitespace()
        .next()
        .and_then(|token| token.parse::<u32>().ok())
}

fn read_optional<E: CommandExecutor>(executor: &E, command: &str, trace_id: &str) -> Option<String> {
    match executor.execute(command, &ExecOptions::default(), trace_id) {
        Ok(output) if !output.trim().is_empty() => Some(output.trim().to_string()),
        Ok(_) => None,
        Err(err) => {
            debug!(trace_id = %trace_id, command = %command, error = %err, "system read failed");
            None
        }
    }
}

fn getprop<E: CommandExecutor>(executor: &E, key: &str, trace_id: &str) -> Option<String> {
    read_optional(executor, &format!("getprop {key}"), trace_id)
}

pub fn daemon_process<E: CommandExecutor>(executor: &E, trace_id: &str) -> DaemonProcess {
    let pid = read_optional(executor, &format!("pidof {DAEMON_PROCESS_NAME}"), trace_id)
        .as_deref()
        .and_then(parse_pidof);
    DaemonProcess {
        running: pid.is_some(),
        pid,
    }
}

/// Every read stands alone; an unreadable source leaves its field empty.
pub fn load_system_info<E: CommandExecutor>(
    executor: &E,
    config_dir: &Path,
    module_dir: &Path,
    trace_id: &str,
) -> SystemInfo {
    let module_prop = read_optional(
        executor,
        &format!("cat {}", shell_quote(&module_prop_path(module_dir).to_string_lossy())),
        trace_id,
    )
    .map(|output| parse_prop_lines(&output))
    .unwrap_or_default();

    let profile = read_optional(
        executor,
        &format!(
            "cat {}",
            shell_quote(&current_profile_path(config_dir).to_string_lossy())
        ),
        trace_id,
    )
    .and_then(|code| profile_label(&code).map(str::to_string));

    SystemInfo {
        module_version: module_prop.get("version").cloned(),
        module_version_code: module_prop.get("versionCode").cloned(),
        profile,
        kernel: read_optional(executor, "uname -r", trace_id),
        chipset: getprop(executor, "ro.board.platform", trace_id),
        codename: getprop(executor, "ro.product.device", trace_id),
        sdk: getprop(executor, "ro.build.version.sdk", trace_id),
        daemon: daemon_process(executor, trace_id),
        collected_at: Utc::now().to_rfc3339(),
    }
}
