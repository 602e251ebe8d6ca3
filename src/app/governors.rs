use tracing::{debug, info, warn};

use crate::app::error::AppError;
use crate::app::models::{GovernorSet, GovernorSource};
use crate::app::paths::validate_governor_name;
use crate::app::shell::{CommandExecutor, ExecOptions};

/// Legacy per-CPU node, unified policy node, alternate naming. Order matters.
pub const GOVERNOR_LIST_PATHS: [&str; 3] = [
    "/sys/devices/system/cpu/cpu0/cpufreq/scaling_available_governors",
    "/sys/devices/system/cpu/cpufreq/policy0/scaling_available_governors",
    "/sys/devices/system/cpu/cpu0/cpufreq/scaling_governors",
];

const READ_PREFIXES: [&str; 2] = ["cat", "busybox cat"];

pub const FALLBACK_GOVERNORS: [&str; 7] = [
    "performance",
    "schedutil",
    "powersave",
    "interactive",
    "conservative",
    "ondemand",
    "userspace",
];

const GOVERNOR_NODE_GLOBS: [&str; 2] = [
    "/sys/devices/system/cpu/cpu*/cpufreq/scaling_governor",
    "/sys/devices/system/cpu/cpufreq/policy*/scaling_governor",
];

pub fn parse_governors(output: &str) -> Vec<String> {
    let mut governors: Vec<String> = Vec::new();
    for name in output.split_whitespace() {
        if !governors.iter().any(|existing| existing == name) {
            governors.push(name.to_string());
        }
    }
    governors
}

/// First path whose plain or busybox read produces governors wins.
pub fn read_available_governors<E: CommandExecutor>(executor: &E, trace_id: &str) -> Option<Vec<String>> {
    for path in GOVERNOR_LIST_PATHS {
        for prefix in READ_PREFIXES {
            let command = format!("{prefix} {path}");
            match executor.execute(&command, &ExecOptions::default(), trace_id) {
                Ok(output) => {
                    let governors = parse_governors(&output);
                    if !governors.is_empty() {
                        debug!(trace_id = %trace_id, path = %path, count = governors.len(), "governors read");
                        return Some(governors);
                    }
                }
                Err(err) => {
                    debug!(trace_id = %trace_id, command = %command, error = %err, "governor read failed");
                }
            }
        }
    }
    None
}

/// Uses `cache` when filled; fills it only from a successful read.
pub fn discover_governors<E: CommandExecutor>(
    executor: &E,
    cache: &mut Option<Vec<String>>,
    trace_id: &str,
) -> GovernorSet {
    if let Some(cached) = cache.as_ref().filter(|list| !list.is_empty()) {
        return GovernorSet {
            governors: cached.clone(),
            source: GovernorSource::Cached,
        };
    }

    match read_available_governors(executor, trace_id) {
        Some(governors) => {
            *cache = Some(governors.clone());
            GovernorSet {
                governors,
                source: GovernorSource::Sysfs,
            }
        }
        None => {
            warn!(trace_id = %trace_id, "no governor node readable, using the built-in list");
            GovernorSet {
                governors: FALLBACK_GOVERNORS.iter().map(|gov| gov.to_string()).collect(),
                source: GovernorSource::Fallback,
            }
        }
    }
}

/// Printed once per node that accepted the write.
const WRITE_MARKER: &str = "WROTE";

fn write_command(glob: &str, governor: &str) -> String {
    format!(
        "for path in {glob}; do if [ -e \"$path\" ] && {{ echo {governor} > \"$path\"; }} 2>/dev/null; then echo {WRITE_MARKER}; fi; done"
    )
}

/// Number of nodes under `globs` that accepted `governor`. Fails when none did.
fn write_governor_nodes<E: CommandExecutor>(
    executor: &E,
    globs: &[&str],
    governor: &str,
    trace_id: &str,
) -> Result<usize, AppError> {
    let mut first_error = None;
    let mut written = 0usize;
    for glob in globs {
        match executor.execute(&write_command(glob, governor), &ExecOptions::default(), trace_id) {
            Ok(output) => {
                let count = output
                    .lines()
                    .filter(|line| line.trim() == WRITE_MARKER)
                    .count();
                debug!(trace_id = %trace_id, glob = %glob, count, "governor nodes written");
                written += count;
            }
            Err(err) => {
                warn!(trace_id = %trace_id, glob = %glob, error = %err, "failed to write governor");
                first_error.get_or_insert(err);
            }
        }
    }

    if written > 0 {
        return Ok(written);
    }
    Err(first_error.unwrap_or_else(|| {
        AppError::empty_result(
            format!("no CPU node accepted governor {governor}"),
            trace_id,
        )
    }))
}

/// Writes `governor` to every per-CPU and per-policy node. At least one node must take it.
pub fn set_global_governor<E: CommandExecutor>(
    executor: &E,
    governor: &str,
    trace_id: &str,
) -> Result<(), AppError> {
    validate_governor_name(governor).map_err(|message| AppError::validation(message, trace_id))?;
    let governor = governor.trim();

    let written = write_governor_nodes(executor, &GOVERNOR_NODE_GLOBS, governor, trace_id)?;
    info!(trace_id = %trace_id, governor = %governor, nodes = written, "global governor set");
    Ok(())
}
