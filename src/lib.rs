//! # portsweep - A Concurrent TCP Port Reachability Scanner
//!
//! portsweep expands an address specification and a port specification
//! into every (address, port) pair, probes each pair with a bounded pool
//! of concurrent workers, and reports every port as opened, closed, or
//! unresponsive, grouped by address.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use portsweep::logging::LogHandle;
//! use portsweep::output::OutputFormat;
//! use portsweep::scanner::{ScanConfig, Scanner};
//! use portsweep::types::{expand_addresses, expand_ports};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let addresses = expand_addresses("192.168.1.1-10").await?;
//!     let ports = expand_ports("22,80,443")?;
//!
//!     let mut scanner = Scanner::new(addresses, ports, ScanConfig::default(), LogHandle::disabled())?;
//!     scanner.start()?;
//!     scanner.scan().await?;
//!     scanner.report(OutputFormat::Plain, &mut std::io::stdout())?;
//!     scanner.stop()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Address and port specification parsing and expansion
//! - [`scanner`] - Probes, task production, completion tracking, result
//!   aggregation and the [`Scanner`] orchestrator
//! - [`output`] - Report rendering
//! - [`logging`] - Console and buffered file log sinks
//! - [`config`] - Settings file
//! - [`cli`] - Command-line surface
//! - [`error`] - Error types

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use error::{ConfigError, ScanError};
pub use scanner::{PortState, ResultTable, ScanConfig, ScanType, Scanner};
pub use types::{PortSpec, TargetSpec};
