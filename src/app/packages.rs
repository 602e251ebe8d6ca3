use tracing::{info, warn};

use crate::app::daemon::{DaemonClient, DaemonTransport};
use crate::app::error::AppError;
use crate::app::models::{PackageListing, PackageSource};
use crate::app::shell::{CommandExecutor, ExecOptions};

pub const PM_LIST_PACKAGES: &str = "/system/bin/pm list packages";
const PACKAGE_MARKER: &str = "package:";
const RAW_PREVIEW_CHARS: usize = 500;

/// Extracts package names from `pm list packages` output, sorted and de-duplicated.
///
/// Lines without the `package:` marker are ignored; `-f` style `path=name` payloads keep the name.
pub fn parse_package_list(output: &str) -> Vec<String> {
    let mut packages = output
        .lines()
        .filter_map(|line| {
            let (_, payload) = line.split_once(PACKAGE_MARKER)?;
            let payload = payload.trim();
            let name = match payload.rsplit_once('=') {
                Some((_, name)) => name.trim(),
                None => payload,
            };
            if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect::<Vec<_>>();
    packages.sort();
    packages.dedup();
    packages
}

/// Socket first, package manager second. The daemon's list is the richer one, so the order never
/// flips.
pub fn load_packages<T, E>(
    daemon: &DaemonClient<T>,
    executor: &E,
    trace_id: &str,
) -> Result<PackageListing, AppError>
where
    T: DaemonTransport,
    E: CommandExecutor,
{
    let (raw, source) = match daemon.list_packages(trace_id) {
        Ok(raw) => (raw, PackageSource::Daemon),
        Err(err) => {
            warn!(
                trace_id = %trace_id,
                error = %err,
                "LIST_PACKAGES over the socket failed, falling back to pm"
            );
            let raw = executor.execute(PM_LIST_PACKAGES, &ExecOptions::list(), trace_id)?;
            (raw, PackageSource::PackageManager)
        }
    };

    let packages = parse_package_list(&raw);
    if packages.is_empty() {
        return Err(AppError::empty_result(
            format!(
                "No packages found. Raw output length: {}. Raw output: {}",
                raw.len(),
                truncate_chars(&raw, RAW_PREVIEW_CHARS)
            ),
            trace_id,
        ));
    }

    info!(trace_id = %trace_id, count = packages.len(), source = ?source, "packages loaded");
    Ok(PackageListing { packages, source })
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &value[..index]),
        None => value.to_string(),
    }
}
