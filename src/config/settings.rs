//! Application settings and paths.
//!
//! Settings are an optional JSON file supplying defaults for the scan and
//! logging configuration. Command-line flags override them.

use crate::error::{ConfigError, ConfigResult};
use crate::logging::DEFAULT_FLUSH_INTERVAL;
use crate::output::OutputFormat;
use crate::scanner::{DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/portsweep)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the platform directories. Nothing is created on disk.
    pub fn discover() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "portsweep", "portsweep")
            .ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Logging defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Echo log events to the console.
    pub console: bool,
    /// Append log events to a file.
    pub file: bool,
    /// Directory for the log file; the working directory when unset.
    pub directory: Option<PathBuf>,
    /// Log file name; timestamped when unset.
    pub file_name: Option<String>,
    /// Seconds between background flushes of the log file.
    pub flush_secs: u64,
    /// Default filter directive.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            console: false,
            file: false,
            directory: None,
            file_name: None,
            flush_secs: DEFAULT_FLUSH_INTERVAL.as_secs(),
            level: "info".to_string(),
        }
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Default concurrency level.
    pub concurrency: usize,
    /// Default per-probe timeout in milliseconds.
    pub timeout_ms: u64,
    /// Default scan type selector.
    pub scan_type: String,
    /// Default output format.
    pub output_format: OutputFormat,
    /// Logging defaults.
    pub log: LogSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            scan_type: "connect".to_string(),
            output_format: OutputFormat::Plain,
            log: LogSettings::default(),
        }
    }
}

impl AppSettings {
    /// Load settings from `path` if given, else from the default location.
    ///
    /// A missing default file yields the built-in defaults; an explicit
    /// path must exist and parse.
    pub fn resolve(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    /// Load settings from the default location.
    pub fn load() -> ConfigResult<Self> {
        let file = match Paths::discover() {
            Ok(paths) => paths.settings_file(),
            Err(_) => return Ok(Self::default()),
        };

        if !file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }
}
