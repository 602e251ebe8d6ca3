use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::app::error::AppError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs `<shell> -c <command>` and waits for it, killing the child once `timeout` elapses.
///
/// A timed-out command never yields its output, even if it would have finished a moment later.
pub fn run_shell_with_timeout(
    shell: &str,
    command: &str,
    working_dir: Option<&Path>,
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    let mut builder = Command::new(shell);
    builder
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = working_dir {
        builder.current_dir(dir);
    }

    let mut child = builder
        .spawn()
        .map_err(|err| AppError::execution(format!("Failed to spawn command: {err}"), trace_id))?;

    // Drain stdout/stderr in parallel; otherwise, a chatty child process can block once the pipe
    // buffer fills, and we will incorrectly hit the timeout.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::execution("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::execution("Failed to capture stderr", trace_id))?;

    let stdout_handle = spawn_drain(stdout);
    let stderr_handle = spawn_drain(stderr);

    let start = Instant::now();
    let exit_code = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    // Grandchildren may still hold the pipes open, so the drain threads are
                    // detached rather than joined.
                    drop(stdout_handle);
                    drop(stderr_handle);
                    debug!(trace_id = %trace_id, timeout_ms = timeout.as_millis() as u64, "command timed out");
                    return Err(AppError::timeout(
                        format!("Command timed out after {} ms", timeout.as_millis()),
                        trace_id,
                    ));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(err) => {
                let _ = child.kill();
                return Err(AppError::execution(
                    format!("Failed to poll command: {err}"),
                    trace_id,
                ));
            }
        }
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        exit_code,
    })
}

fn spawn_drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::<u8>::new();
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => buffer.extend_from_slice(&temp[..count]),
                Err(_) => break,
            }
        }
        buffer
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn run_shell_does_not_deadlock_on_large_stdout() {
        // If stdout/stderr are piped but not drained, the child blocks once the pipe buffer
        // fills and an otherwise-fast command "hangs" until the timeout.
        let output = run_shell_with_timeout(
            "sh",
            "i=0; while [ $i -lt 100000 ]; do echo 1234567890; i=$((i+1)); done",
            None,
            Duration::from_secs(20),
            "test-trace-large-output",
        )
        .expect("expected large-output command to complete without timing out");

        assert_eq!(output.exit_code, Some(0));
        assert!(output.stdout.len() >= 1_000_000);
    }

    #[test]
    fn run_shell_times_out_and_discards_output() {
        let started = Instant::now();
        let err = run_shell_with_timeout(
            "sh",
            "sleep 5; echo late",
            None,
            Duration::from_millis(200),
            "test-trace-timeout",
        )
        .expect_err("expected timeout");

        assert!(err.is_timeout());
        assert_eq!(err.trace_id, "test-trace-timeout");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn run_shell_honours_working_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = run_shell_with_timeout(
            "sh",
            "pwd",
            Some(dir.path()),
            Duration::from_secs(5),
            "test-trace-cwd",
        )
        .expect("pwd");
        let reported = std::fs::canonicalize(output.stdout.trim()).expect("canonical pwd");
        let expected = std::fs::canonicalize(dir.path()).expect("canonical dir");
        assert_eq!(reported, expected);
    }

    #[test]
    fn run_shell_reports_spawn_failure() {
        let err = run_shell_with_timeout(
            "/definitely/not/a/shell",
            "true",
            None,
            Duration::from_secs(1),
            "test-trace-spawn",
        )
        .expect_err("expected spawn failure");
        assert_eq!(err.code, "ERR_EXECUTION");
    }
}
