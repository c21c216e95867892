//! Command-line interface definitions for portsweep.
//!
//! Uses `clap` derive macros for declarative argument parsing. Flags
//! override the values loaded from the settings file.

use crate::config::AppSettings;
use crate::error::ConfigResult;
use crate::logging::{FileSinkConfig, LogConfig, DEFAULT_FLUSH_INTERVAL};
use crate::output::{self, OutputFormat};
use crate::scanner::{ScanConfig, ScanType, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

/// A concurrent TCP port reachability scanner.
#[derive(Parser, Debug)]
#[command(name = "portsweep")]
#[command(version, about = "Probe address and port ranges for reachable TCP services", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Args {
    /// Addresses to scan
    ///
    /// Examples:
    ///   192.168.1.1        Single IP address
    ///   example.com        Hostname (first resolved address)
    ///   192.168.1.1-20     Range over the last octet
    #[arg(short = 'i', long = "host", value_name = "SPEC")]
    pub host: String,

    /// Ports to scan (e.g., "80", "80,443", "1-1000", "-1024")
    #[arg(short = 'p', long, value_name = "SPEC", allow_hyphen_values = true)]
    pub ports: String,

    /// Maximum number of probes in flight
    #[arg(short = 'g', long, value_name = "N", allow_negative_numbers = true)]
    pub concurrency: Option<i64>,

    /// Connection timeout in milliseconds
    #[arg(short = 't', long, value_name = "MS", allow_negative_numbers = true)]
    pub timeout: Option<i64>,

    /// Scan type: connect, syn, fin or device
    #[arg(short = 'T', long = "scan-type", value_name = "NAME")]
    pub scan_type: Option<String>,

    /// Log to the console and show scanning progress
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Write the log to a file
    #[arg(short = 'l', long)]
    pub log: bool,

    /// Directory for the log file
    #[arg(short = 'P', long = "filepath", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Name of the log file
    #[arg(short = 'n', long = "filename", value_name = "NAME")]
    pub log_name: Option<String>,

    /// Seconds between log file flushes
    #[arg(short = 'f', long = "flush", value_name = "SECS", allow_negative_numbers = true)]
    pub flush: Option<i64>,

    /// Output format for results
    #[arg(short = 'o', long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Path to a settings file
    #[arg(long, value_name = "PATH", env = "PORTSWEEP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print version
    #[arg(long, action = ArgAction::Version)]
    pub version: Option<bool>,
}

impl Args {
    /// Load the settings file named by `--config`, or the default one.
    pub fn settings(&self) -> ConfigResult<AppSettings> {
        AppSettings::resolve(self.config.as_deref())
    }

    /// Merge flags over settings into a scan configuration.
    pub fn scan_config(&self, settings: &AppSettings) -> ScanConfig {
        let concurrency = self
            .concurrency
            .unwrap_or(settings.concurrency as i64);
        let concurrency = usize::try_from(concurrency)
            .ok()
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_CONCURRENCY);

        let timeout = self.timeout.unwrap_or(settings.timeout_ms as i64);
        let timeout = u64::try_from(timeout)
            .ok()
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let selector = self.scan_type.as_deref().unwrap_or(&settings.scan_type);
        if selector.parse::<ScanType>().is_err() {
            output::print_warning(&format!("unknown scan type '{}', using connect", selector));
        }

        let config = ScanConfig::new()
            .with_concurrency(concurrency)
            .with_timeout(timeout)
            .with_scan_type(ScanType::from_selector(selector));

        if self.verbose {
            config.with_progress()
        } else {
            config
        }
    }

    /// Merge flags over settings into a logging configuration.
    pub fn log_config(&self, settings: &AppSettings) -> LogConfig {
        let log = &settings.log;

        let file = (self.log || log.file).then(|| {
            let directory = self
                .log_dir
                .clone()
                .or_else(|| log.directory.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = self
                .log_name
                .clone()
                .or_else(|| log.file_name.clone())
                .unwrap_or_default();
            let flush = self.flush.unwrap_or(log.flush_secs as i64);
            let flush = u64::try_from(flush)
                .ok()
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_FLUSH_INTERVAL);

            FileSinkConfig::new(directory, file_name).with_flush_interval(flush)
        });

        LogConfig {
            console: self.verbose || log.console,
            level: log.level.clone(),
            file,
        }
    }

    /// Report format, from the flag or the settings.
    pub fn output_format(&self, settings: &AppSettings) -> OutputFormat {
        self.output.unwrap_or(settings.output_format)
    }
}
