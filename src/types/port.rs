//! Port specification parsing and expansion.
//!
//! A port spec is a comma-separated list of entries. Each entry is one of:
//! - a literal port: "80"
//! - an inclusive range: "8000-8010" (inverted bounds are swapped)
//! - an open-start range: "-1024" (implied start 0)
//!
//! Every port must lie in 0-65535.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Highest valid port number.
pub const MAX_PORT: i64 = u16::MAX as i64;

/// Error type for port spec parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("port {0} is out of valid range (0-65535)")]
    OutOfRange(i64),
    #[error("invalid port entry: '{0}'")]
    InvalidFormat(String),
    #[error("empty port specification")]
    Empty,
}

/// An inclusive range of ports, always stored with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Create a range, swapping the bounds when they are inverted.
    pub fn new(start: u16, end: u16) -> Self {
        if start > end {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Create a range containing a single port.
    pub const fn single(port: u16) -> Self {
        Self { start: port, end: port }
    }

    pub const fn start(&self) -> u16 {
        self.start
    }

    pub const fn end(&self) -> u16 {
        self.end
    }

    /// Number of ports in this range.
    pub const fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    /// A valid range always holds at least one port.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over all ports in this range.
    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A parsed port specification, entries kept in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortSpec {
    ranges: Vec<PortRange>,
}

impl PortSpec {
    pub const fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    pub fn add_range(&mut self, range: PortRange) {
        self.ranges.push(range);
    }

    pub fn add_port(&mut self, port: u16) {
        self.ranges.push(PortRange::single(port));
    }

    pub fn ranges(&self) -> &[PortRange] {
        &self.ranges
    }

    /// Expand to the deduplicated list of ports, in first-seen order.
    pub fn to_ports(&self) -> Vec<u16> {
        let mut seen = HashSet::new();
        self.ranges
            .iter()
            .flat_map(PortRange::iter)
            .filter(|port| seen.insert(*port))
            .collect()
    }

    /// Number of unique ports.
    pub fn count(&self) -> usize {
        self.to_ports().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl FromStr for PortSpec {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PortError::Empty);
        }

        let mut spec = Self::new();
        for part in s.split(',') {
            spec.add_range(parse_entry(part)?);
        }
        Ok(spec)
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

fn parse_entry(part: &str) -> Result<PortRange, PortError> {
    let part = part.trim();
    if part.is_empty() {
        return Err(PortError::InvalidFormat(part.to_string()));
    }

    match part.split_once('-') {
        None => parse_port(part).map(PortRange::single),
        Some((start, end)) => {
            let start = start.trim();
            let start = if start.is_empty() { 0 } else { parse_port(start)? };
            let end = parse_port(end.trim())?;
            Ok(PortRange::new(start, end))
        }
    }
}

fn parse_port(raw: &str) -> Result<u16, PortError> {
    let value: i64 = raw
        .parse()
        .map_err(|_| PortError::InvalidFormat(raw.to_string()))?;
    if !(0..=MAX_PORT).contains(&value) {
        return Err(PortError::OutOfRange(value));
    }
    Ok(value as u16)
}
