use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The executor's timer fired before the command finished.
    Timeout,
    /// The command ran but exited with a non-zero status.
    NonZeroExit,
    /// The command could not be spawned or polled.
    ExecutionException,
    ParseFailure,
    /// The command succeeded but produced nothing usable.
    EmptyResult,
    /// The daemon answered with an `ERR` reply.
    DaemonRejected,
    Validation,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "ERR_TIMEOUT",
            ErrorKind::NonZeroExit => "ERR_NON_ZERO_EXIT",
            ErrorKind::ExecutionException => "ERR_EXECUTION",
            ErrorKind::ParseFailure => "ERR_PARSE",
            ErrorKind::EmptyResult => "ERR_EMPTY_RESULT",
            ErrorKind::DaemonRejected => "ERR_DAEMON",
            ErrorKind::Validation => "ERR_VALIDATION",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub kind: ErrorKind,
    pub error: String,
    pub code: String,
    pub trace_id: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            kind,
            error: message.into(),
            code: kind.code().to_string(),
            trace_id: trace_id.into(),
        }
    }

    pub fn timeout(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message, trace_id)
    }

    pub fn non_zero_exit(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::NonZeroExit, message, trace_id)
    }

    pub fn execution(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExecutionException, message, trace_id)
    }

    pub fn parse(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailure, message, trace_id)
    }

    pub fn empty_result(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::EmptyResult, message, trace_id)
    }

    pub fn daemon(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::DaemonRejected, message, trace_id)
    }

    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message, trace_id)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_follows_kind() {
        let err = AppError::timeout("Command timed out", "trace-1");
        assert_eq!(err.code, "ERR_TIMEOUT");
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Command timed out (ERR_TIMEOUT)");

        let err = AppError::daemon("ERR ADD_GAME", "trace-2");
        assert_eq!(err.kind, ErrorKind::DaemonRejected);
        assert_eq!(err.code, "ERR_DAEMON");
    }
}
