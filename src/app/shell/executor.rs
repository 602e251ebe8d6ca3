use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use crate::app::error::AppError;
use crate::app::shell::runner::run_shell_with_timeout;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const LIST_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Trimmed stdout on success, a typed failure otherwise.
pub type CommandResult = Result<String, AppError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ExecOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            working_dir: None,
            timeout,
        }
    }

    pub fn list() -> Self {
        Self::with_timeout(LIST_TIMEOUT)
    }
}

/// Runs one shell command line. Implementations hold no state between calls and never retry.
pub trait CommandExecutor {
    fn execute(&self, command: &str, options: &ExecOptions, trace_id: &str) -> CommandResult;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for &T {
    fn execute(&self, command: &str, options: &ExecOptions, trace_id: &str) -> CommandResult {
        (**self).execute(command, options, trace_id)
    }
}

#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl CommandExecutor for ShellExecutor {
    fn execute(&self, command: &str, options: &ExecOptions, trace_id: &str) -> CommandResult {
        debug!(trace_id = %trace_id, command = %command, "executing shell command");
        let output = run_shell_with_timeout(
            &self.shell,
            command,
            options.working_dir.as_deref(),
            options.timeout,
            trace_id,
        )?;

        if output.success() {
            return Ok(output.stdout.trim().to_string());
        }

        let stderr = output.stderr.trim();
        warn!(
            trace_id = %trace_id,
            command = %command,
            exit_code = ?output.exit_code,
            stderr = %stderr,
            "shell command failed"
        );
        let message = if stderr.is_empty() {
            "Unknown error".to_string()
        } else {
            stderr.to_string()
        };
        Err(AppError::non_zero_exit(message, trace_id))
    }
}
