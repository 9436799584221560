//! Error types shared across Gymkhana crates.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for Gymkhana operations.
#[derive(Debug, thiserror::Error)]
pub enum GymkhanaError {
    #[error("Cannot open {path}: {message}")]
    CannotOpen { path: PathBuf, message: String },

    #[error("Decode failed: {message}")]
    DecodeFailed { message: String },

    #[error("Invalid range: {message}")]
    InvalidRange { message: String },

    #[error("An export is already running")]
    AlreadyRunning,

    #[error("Cannot create output {path}: {message}")]
    SinkCreationFailed { path: PathBuf, message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    #[error("Export cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using GymkhanaError.
pub type GymkhanaResult<T> = Result<T, GymkhanaError>;

/// Coarse classification of an error, stable enough to show to a user
/// or to match on across a thread boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CannotOpen,
    DecodeFailed,
    InvalidRange,
    AlreadyRunning,
    SinkCreationFailed,
    WriteFailed,
    InvalidValue,
    Cancelled,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CannotOpen => "cannot_open",
            Self::DecodeFailed => "decode_failed",
            Self::InvalidRange => "invalid_range",
            Self::AlreadyRunning => "already_running",
            Self::SinkCreationFailed => "sink_creation_failed",
            Self::WriteFailed => "write_failed",
            Self::InvalidValue => "invalid_value",
            Self::Cancelled => "cancelled",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-facing failure report: a kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl From<&GymkhanaError> for Failure {
    fn from(err: &GymkhanaError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<GymkhanaError> for Failure {
    fn from(err: GymkhanaError) -> Self {
        Self::from(&err)
    }
}

impl GymkhanaError {
    pub fn cannot_open(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::CannotOpen {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn decode_failed(msg: impl Into<String>) -> Self {
        Self::DecodeFailed {
            message: msg.into(),
        }
    }

    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidRange {
            message: msg.into(),
        }
    }

    pub fn sink_creation_failed(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::SinkCreationFailed {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: msg.into(),
        }
    }

    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Classify this error for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CannotOpen { .. } => ErrorKind::CannotOpen,
            Self::DecodeFailed { .. } => ErrorKind::DecodeFailed,
            Self::InvalidRange { .. } => ErrorKind::InvalidRange,
            Self::AlreadyRunning => ErrorKind::AlreadyRunning,
            Self::SinkCreationFailed { .. } => ErrorKind::SinkCreationFailed,
            Self::WriteFailed { .. } => ErrorKind::WriteFailed,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Config { .. } | Self::Json(_) => ErrorKind::Config,
            Self::Io(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Whether the error only affects a single frame and the caller may
    /// carry on with the next one.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DecodeFailed { .. })
    }
}
