//! Collects the daemon log and the kernel ring buffer into shared storage.
//!
//! `<export_dir>/auriya.log` and `<export_dir>/kernel.log` are written first, then the directory
//! is packed next to itself as `<export_dir>.tar.gz`. Without a working `tar` the directory is
//! the result.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::app::error::AppError;
use crate::app::models::LogExport;
use crate::app::paths::shell_quote;
use crate::app::shell::{CommandExecutor, ExecOptions};

pub const DAEMON_LOG_NAME: &str = "auriya.log";
pub const KERNEL_LOG_NAME: &str = "kernel.log";

pub fn archive_path(export_dir: &Path) -> PathBuf {
    export_dir.with_extension("tar.gz")
}

fn quoted(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

/// Only a missing export directory aborts. Copy, `dmesg` and `tar` failures are logged.
pub fn export_logs<E: CommandExecutor>(
    executor: &E,
    daemon_log: &Path,
    export_dir: &Path,
    trace_id: &str,
) -> Result<LogExport, AppError> {
    let options = ExecOptions::default();
    executor.execute(&format!("mkdir -p {}", quoted(export_dir)), &options, trace_id)?;

    let steps = [
        format!(
            "cp {} {}",
            quoted(daemon_log),
            quoted(&export_dir.join(DAEMON_LOG_NAME))
        ),
        format!("dmesg > {}", quoted(&export_dir.join(KERNEL_LOG_NAME))),
    ];
    for command in &steps {
        if let Err(err) = executor.execute(command, &options, trace_id) {
            warn!(trace_id = %trace_id, command = %command, error = %err, "log collection step failed");
        }
    }

    let (Some(parent), Some(name)) = (export_dir.parent(), export_dir.file_name()) else {
        return Ok(LogExport {
            path: export_dir.display().to_string(),
            archived: false,
        });
    };
    let archive = archive_path(export_dir);
    let tar = format!(
        "tar -czf {} -C {} {}",
        quoted(&archive),
        quoted(parent),
        shell_quote(&name.to_string_lossy())
    );
    let export = match executor.execute(&tar, &options, trace_id) {
        Ok(_) => LogExport {
            path: archive.display().to_string(),
            archived: true,
        },
        Err(err) => {
            warn!(trace_id = %trace_id, error = %err, "could not archive logs, leaving the directory");
            LogExport {
                path: export_dir.display().to_string(),
                archived: false,
            }
        }
    };
    info!(trace_id = %trace_id, path = %export.path, archived = export.archived, "logs exported");
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::shell::scripted::ScriptedExecutor;

    const DAEMON_LOG: &str = "/data/adb/auriya/daemon.log";
    const EXPORT_DIR: &str = "/sdcard/Download/AuriyaLogs";

    #[test]
    fn archives_next_to_the_export_directory() {
        let executor = ScriptedExecutor::new()
            .on("mkdir -p", Ok(String::new()))
            .on("cp ", Ok(String::new()))
            .on("dmesg", Ok(String::new()))
            .on("tar -czf", Ok(String::new()));
        let export = export_logs(&executor, Path::new(DAEMON_LOG), Path::new(EXPORT_DIR), "t")
            .expect("export");
        assert_eq!(
            export,
            LogExport {
                path: "/sdcard/Download/AuriyaLogs.tar.gz".to_string(),
                archived: true,
            }
        );
        assert_eq!(
            executor.calls(),
            vec![
                "mkdir -p '/sdcard/Download/AuriyaLogs'".to_string(),
                "cp '/data/adb/auriya/daemon.log' '/sdcard/Download/AuriyaLogs/auriya.log'".to_string(),
                "dmesg > '/sdcard/Download/AuriyaLogs/kernel.log'".to_string(),
                "tar -czf '/sdcard/Download/AuriyaLogs.tar.gz' -C '/sdcard/Download' 'AuriyaLogs'".to_string(),
            ]
        );
    }

    #[test]
    fn missing_tar_leaves_the_directory() {
        let executor = ScriptedExecutor::new()
            .on("mkdir -p", Ok(String::new()))
            .on("cp ", Err(AppError::non_zero_exit("No such file or directory", "t")))
            .on("dmesg", Ok(String::new()))
            .on("tar -czf", Err(AppError::non_zero_exit("tar: not found", "t")));
        let export = export_logs(&executor, Path::new(DAEMON_LOG), Path::new(EXPORT_DIR), "t")
            .expect("export");
        assert_eq!(export.path, EXPORT_DIR);
        assert!(!export.archived);
        assert_eq!(executor.calls().len(), 4);
    }

    #[test]
    fn unwritable_export_directory_is_an_error() {
        let executor = ScriptedExecutor::new().on(
            "mkdir -p",
            Err(AppError::non_zero_exit("Read-only file system", "t-logs")),
        );
        let err = export_logs(&executor, Path::new(DAEMON_LOG), Path::new(EXPORT_DIR), "t-logs")
            .expect_err("mkdir failed");
        assert_eq!(err.code, "ERR_NON_ZERO_EXIT");
        assert_eq!(executor.calls().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn exports_through_the_shell() {
        use crate::app::shell::ShellExecutor;

        let dir = tempfile::tempdir().expect("tempdir");
        let daemon_log = dir.path().join("daemon.log");
        std::fs::write(&daemon_log, "INFO started\n").expect("log");
        let export_dir = dir.path().join("AuriyaLogs");

        let export = export_logs(&ShellExecutor::default(), &daemon_log, &export_dir, "t")
            .expect("export");
        let copied = std::fs::read_to_string(export_dir.join(DAEMON_LOG_NAME)).expect("copied");
        assert_eq!(copied, "INFO started\n");
        assert!(export_dir.join(KERNEL_LOG_NAME).exists());
        if export.archived {
            assert!(archive_path(&export_dir).exists());
        } else {
            assert_eq!(export.path, export_dir.display().to_string());
        }
    }
}
