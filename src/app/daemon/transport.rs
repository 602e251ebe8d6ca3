use std::io::{self, BufRead, BufReader, ErrorKind as IoErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::error::AppError;
use crate::app::paths::shell_quote;
use crate::app::shell::{CommandExecutor, CommandResult, ExecOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// `echo "<LINE>" | nc -U <socket>` through the command executor.
    #[default]
    ShellPipe,
    /// Direct `UnixStream` connection.
    UnixSocket,
}

/// Delivers one protocol line and returns the raw reply text.
pub trait DaemonTransport {
    fn send(&self, line: &str, timeout: Duration, trace_id: &str) -> CommandResult;
}

pub struct ShellPipeTransport<E> {
    executor: E,
    socket_path: String,
}

impl<E: CommandExecutor> ShellPipeTransport<E> {
    pub fn new(executor: E, socket_path: impl Into<String>) -> Self {
        Self {
            executor,
            socket_path: socket_path.into(),
        }
    }

    pub fn pipe_command(&self, line: &str) -> String {
        format!(
            "echo {} | nc -U {}",
            shell_quote(line),
            shell_quote(&self.socket_path)
        )
    }
}

impl<E: CommandExecutor> DaemonTransport for ShellPipeTransport<E> {
    fn send(&self, line: &str, timeout: Duration, trace_id: &str) -> CommandResult {
        let command = self.pipe_command(line);
        self.executor
            .execute(&command, &ExecOptions::with_timeout(timeout), trace_id)
    }
}

fn remaining_until(deadline: Instant) -> io::Result<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
        .ok_or_else(|| io::Error::new(IoErrorKind::TimedOut, "daemon exchange deadline passed"))
}

/// Each read waits only for what is left until `deadline`.
struct DeadlineReader {
    stream: UnixStream,
    deadline: Instant,
}

impl Read for DeadlineReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream
            .set_read_timeout(Some(remaining_until(self.deadline)?))?;
        self.stream.read(buf)
    }
}

pub struct UnixSocketTransport {
    socket_path: PathBuf,
}

impl UnixSocketTransport {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// `timeout` bounds the whole exchange, greeting to last reply byte.
    fn exchange(&self, line: &str, timeout: Duration) -> io::Result<String> {
        let deadline = Instant::now() + timeout;
        let stream = UnixStream::connect(&self.socket_path)?;

        let mut reader = BufReader::new(DeadlineReader {
            stream: stream.try_clone()?,
            deadline,
        });
        let mut greeting = String::new();
        reader.read_line(&mut greeting)?;
        debug!(greeting = %greeting.trim(), "daemon greeting");

        let mut writer = stream;
        writer.set_write_timeout(Some(remaining_until(deadline)?))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        writer.shutdown(Shutdown::Write)?;

        let mut response = String::new();
        reader.read_to_string(&mut response)?;
        Ok(response.trim().to_string())
    }
}

impl DaemonTransport for UnixSocketTransport {
    fn send(&self, line: &str, timeout: Duration, trace_id: &str) -> CommandResult {
        self.exchange(line, timeout).map_err(|err| match err.kind() {
            IoErrorKind::WouldBlock | IoErrorKind::TimedOut => AppError::timeout(
                format!("Daemon did not answer within {} ms", timeout.as_millis()),
                trace_id,
            ),
            _ => AppError::execution(
                format!(
                    "Failed to talk to daemon at {}: {err}",
                    self.socket_path.display()
                ),
                trace_id,
            ),
        })
    }
}

/// Transport picked at runtime from configuration.
pub enum Transport<E> {
    ShellPipe(ShellPipeTransport<E>),
    UnixSocket(UnixSocketTransport),
}

impl<E: CommandExecutor> Transport<E> {
    pub fn from_kind(kind: TransportKind, executor: E, socket_path: &str) -> Self {
        match kind {
            TransportKind::ShellPipe => {
                Transport::ShellPipe(ShellPipeTransport::new(executor, socket_path))
            }
            TransportKind::UnixSocket => {
                Transport::UnixSocket(UnixSocketTransport::new(socket_path))
            }
        }
    }
}

impl<E: CommandExecutor> DaemonTransport for Transport<E> {
    fn send(&self, line: &str, timeout: Duration, trace_id: &str) -> CommandResult {
        match self {
            Transport::ShellPipe(inner) => inner.send(line, timeout, trace_id),
            Transport::UnixSocket(inner) => inner.send(line, timeout, trace_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::error::ErrorKind;
    use crate::app::shell::scripted::ScriptedExecutor;
    use std::os::unix::net::UnixListener;

    #[test]
    fn shell_pipe_quotes_line_and_socket() {
        let executor = ScriptedExecutor::new().on("nc -U", Ok("OK AURIYA IPC\nFPS=60".to_string()));
        let transport = ShellPipeTransport::new(&executor, "/dev/socket/auriya.sock");
        let reply = transport
            .send("GET_FPS", Duration::from_secs(5), "t-pipe")
            .expect("reply");
        assert_eq!(reply, "OK AURIYA IPC\nFPS=60");
        assert_eq!(
            executor.calls(),
            vec!["echo 'GET_FPS' | nc -U '/dev/socket/auriya.sock'".to_string()]
        );
        assert_eq!(
            executor.options_for("GET_FPS").map(|opts| opts.timeout),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn unix_socket_reads_greeting_then_reply() {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket = dir.path().join("auriya.sock");
        let listener = UnixListener::bind(&socket).expect("bind");

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut writer = stream.try_clone().expect("clone");
            writer.write_all(b"OK AURIYA IPC\n").expect("greet");
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).expect("read line");
            let reply = if line.trim() == "STATUS" {
                "ENABLED=true PACKAGES=2 OVERRIDE=None LOG_LEVEL=Debug\n"
            } else {
                "ERR unknown command\n"
            };
            writer.write_all(reply.as_bytes()).expect("reply");
        });

        let transport = UnixSocketTransport::new(&socket);
        let reply = transport
            .send("STATUS", Duration::from_secs(5), "t-sock")
            .expect("reply");
        server.join().expect("server");
        assert_eq!(reply, "ENABLED=true PACKAGES=2 OVERRIDE=None LOG_LEVEL=Debug");
    }

    #[test]
    fn unix_socket_times_out_on_silent_daemon() {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket = dir.path().join("silent.sock");
        let listener = UnixListener::bind(&socket).expect("bind");
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            std::thread::sleep(Duration::from_millis(600));
            drop(stream);
        });

        let transport = UnixSocketTransport::new(&socket);
        let err = transport
            .send("STATUS", Duration::from_millis(100), "t-silent")
            .expect_err("timeout");
        assert_eq!(err.kind, ErrorKind::Timeout);
        server.join().expect("server");
    }

    #[test]
    fn unix_socket_deadline_covers_a_slow_reply() {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket = dir.path().join("slow.sock");
        let listener = UnixListener::bind(&socket).expect("bind");
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut writer = stream.try_clone().expect("clone");
            writer.write_all(b"OK AURIYA IPC\n").expect("greet");
            let mut line = String::new();
            BufReader::new(stream).read_line(&mut line).expect("read line");
            for _ in 0..30 {
                std::thread::sleep(Duration::from_millis(50));
                if writer.write_all(b"x").is_err() {
                    break;
                }
            }
        });

        let started = Instant::now();
        let transport = UnixSocketTransport::new(&socket);
        let err = transport
            .send("STATUS", Duration::from_millis(150), "t-slow")
            .expect_err("deadline");
        let elapsed = started.elapsed();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.trace_id, "t-slow");
        assert!(elapsed < Duration::from_millis(600), "took {elapsed:?}");
        server.join().expect("server");
    }

    #[test]
    fn unix_socket_missing_path_is_execution_error() {
        let transport = UnixSocketTransport::new("/nonexistent/auriya.sock");
        let err = transport
            .send("PING", Duration::from_millis(100), "t-missing")
            .expect_err("connect failure");
        assert_eq!(err.kind, ErrorKind::ExecutionException);
    }
}
