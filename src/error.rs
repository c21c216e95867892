//! Error types for portsweep.
//!
//! Uses `thiserror` for ergonomic error definitions. Probe-level failures
//! (refusal, timeout, unreachable hosts) are not errors; they are folded
//! into a [`PortState`](crate::scanner::PortState).

use crate::scanner::ScanType;
use crate::types::{PortError, TargetError};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scanning operations.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("scan strategy '{0}' is not supported")]
    UnsupportedStrategy(ScanType),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("scanner has not been started")]
    NotStarted,

    #[error("scanner has already been started")]
    AlreadyStarted,

    #[error("scan has already completed")]
    AlreadyScanned,

    #[error("scan pipeline closed before every task reported an outcome")]
    PipelineClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors loading application settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine the configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid settings file: {0}")]
    InvalidFormat(String),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
