//! Probe abstraction and scan value types.
//!
//! Defines the common interface for probe strategies along with the
//! task, outcome and configuration values that flow through a scan.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Default maximum number of probes in flight.
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Default per-probe timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Reachability state of a probed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// The handshake completed.
    Opened,
    /// The target explicitly refused the connection.
    Closed,
    /// No usable answer: timeout, unreachable host, or any other failure.
    Unresponsive,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::Closed => write!(f, "closed"),
            Self::Unresponsive => write!(f, "unresponsive"),
        }
    }
}

/// One unit of scan work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Task {
    pub address: IpAddr,
    pub port: u16,
}

impl Task {
    pub const fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }
}

/// The classified result of probing one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub address: IpAddr,
    pub port: u16,
    pub state: PortState,
}

impl ProbeOutcome {
    pub const fn new(task: Task, state: PortState) -> Self {
        Self {
            address: task.address,
            port: task.port,
            state,
        }
    }
}

/// Available scan strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// TCP connect scan (default, no special privileges required).
    #[default]
    Connect,
    /// Half-open SYN scan (raw sockets, requires root).
    Syn,
    /// FIN scan (raw sockets, requires root).
    Fin,
    /// Link-layer device discovery.
    Device,
}

impl ScanType {
    /// Whether this strategy needs elevated privileges.
    pub const fn requires_privileges(self) -> bool {
        matches!(self, Self::Syn | Self::Fin)
    }

    /// Map a free-form selector to a strategy, falling back to
    /// [`ScanType::Connect`] for anything unrecognized.
    ///
    /// Silent; callers that want to warn about the fallback check
    /// [`FromStr`](std::str::FromStr) themselves.
    pub fn from_selector(selector: &str) -> Self {
        selector.parse().unwrap_or_default()
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Syn => write!(f, "syn"),
            Self::Fin => write!(f, "fin"),
            Self::Device => write!(f, "device"),
        }
    }
}

impl std::str::FromStr for ScanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "connect" | "tcp" => Ok(Self::Connect),
            "syn" => Ok(Self::Syn),
            "fin" => Ok(Self::Fin),
            "device" => Ok(Self::Device),
            _ => Err(format!("unknown scan type: {}", s)),
        }
    }
}

/// Configuration for one scan. Immutable once handed to a scanner.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Maximum number of probes in flight.
    pub concurrency: usize,
    /// Per-probe connect timeout.
    pub timeout: Duration,
    /// Probe strategy.
    pub scan_type: ScanType,
    /// Draw a progress bar while collecting outcomes.
    pub show_progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            scan_type: ScanType::Connect,
            show_progress: false,
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_scan_type(mut self, scan_type: ScanType) -> Self {
        self.scan_type = scan_type;
        self
    }

    pub fn with_progress(mut self) -> Self {
        self.show_progress = true;
        self
    }

    /// Reject values no scan can run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// A probe strategy.
///
/// Implementations classify a single (address, port) pair. They are
/// shared across workers, so every call must be independent.
#[async_trait]
pub trait Probe: Send + Sync {
    /// The scan type this probe implements.
    fn scan_type(&self) -> ScanType;

    /// Probe one port, giving up after `timeout`.
    async fn probe(&self, address: IpAddr, port: u16, timeout: Duration) -> PortState;
}
