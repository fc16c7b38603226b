use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Allocation Errors
    #[error("Timestamp not found: physical clock has not been set")]
    TimestampNotFound,

    #[error("Size of requested timestamps is too large: requested={requested}, max={max}")]
    BatchTooLarge {
        requested: u32,
        max: u32,
    },

    #[error("TSO logical clock overflow. Physical: {physical} | Logical: {logical}")]
    LogicalClockOverflow {
        physical: u64,
        logical: u64,
    },

    #[error("Physical time {physical} exceeds the layout maximum {max}")]
    PhysicalTimeOutOfRange {
        physical: u64,
        max: u64,
    },

    #[error("Invalid clock layout: {logical_bits} logical bits")]
    InvalidClockLayout { logical_bits: u32 },

    // Leadership Errors
    #[error("Leader election error: {0}")]
    ElectionError(String),

    // System Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("No tokio runtime available: {0}")]
    RuntimeUnavailable(String),

    // IO Errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Wire-level error code carried in timestamp responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    TimestampNotFound,
    BatchTooLarge,
    LogicalClockOverflow,
    Internal,
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::TimestampNotFound => ErrorCode::TimestampNotFound,
            Error::BatchTooLarge { .. } => ErrorCode::BatchTooLarge,
            Error::LogicalClockOverflow { .. } => ErrorCode::LogicalClockOverflow,
            _ => ErrorCode::Internal,
        }
    }
}

impl From<prometheus::Error> for Error {
    fn from(e: prometheus::Error) -> Self {
        Error::MetricsError(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::ConfigError(e.to_string())
    }
}
