use serde::Serialize;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Usage,
    NotAuthenticated,
    RequestFailed,
    MalformedResponse,
    InvalidEntity,
    SyncInProgress,
    Network,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Usage = 2,
    Auth = 3,
    Remote = 4,
    Busy = 5,
    Io = 6,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[error("{message}")]
pub struct KeepError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl KeepError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, message)
    }

    pub fn not_authenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, message)
    }

    /// A non-2xx answer from the notes service. The message is the
    /// user-facing text for `status`, optionally followed by the server's own
    /// explanation. A 401 means the token was rejected and is reported as
    /// `NotAuthenticated`.
    pub fn request_failed(status: u16, detail: Option<&str>) -> Self {
        let base = status_message(status);
        let message = match detail.map(str::trim).filter(|text| !text.is_empty()) {
            Some(detail) => format!("{base}: {detail} [http_status={status}]"),
            None => format!("{base} [http_status={status}]"),
        };

        let kind = if status == 401 {
            ErrorKind::NotAuthenticated
        } else {
            ErrorKind::RequestFailed
        };

        Self {
            kind,
            message,
            status: Some(status),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }

    pub fn invalid_entity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidEntity, message)
    }

    pub fn sync_in_progress() -> Self {
        Self::new(ErrorKind::SyncInProgress, "a sync is already in progress")
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    /// True when the service rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.kind {
            ErrorKind::Usage => ExitCode::Usage,
            ErrorKind::NotAuthenticated => ExitCode::Auth,
            ErrorKind::RequestFailed
            | ErrorKind::MalformedResponse
            | ErrorKind::InvalidEntity
            | ErrorKind::Network => ExitCode::Remote,
            ErrorKind::SyncInProgress => ExitCode::Busy,
            ErrorKind::Io => ExitCode::Io,
        }
    }
}

/// Human-readable text for an HTTP status, without leaking response details.
pub fn status_message(status: u16) -> &'static str {
    match status {
        400 => "invalid request",
        401 => "session expired, sign in again",
        403 => "access denied",
        404 => "resource not found",
        422 => "invalid data",
        429 => "too many requests, try again later",
        500..=599 => "server error, try again later",
        _ => "request failed",
    }
}

impl From<std::io::Error> for KeepError {
    fn from(value: std::io::Error) -> Self {
        Self::io(value.to_string())
    }
}

impl From<&str> for KeepError {
    fn from(value: &str) -> Self {
        Self::usage(value)
    }
}

impl From<String> for KeepError {
    fn from(value: String) -> Self {
        Self::usage(value)
    }
}

impl<T: Display> From<(ErrorKind, T)> for KeepError {
    fn from((kind, value): (ErrorKind, T)) -> Self {
        Self::new(kind, value.to_string())
    }
}

pub type KeepResult<T> = Result<T, KeepError>;
