//! Address specification parsing, expansion and resolution.
//!
//! An address spec is a comma-separated list of entries. Each entry is one of:
//! - an IP address (IPv4 or IPv6): "192.168.1.1", "::1"
//! - a hostname, resolved through DNS: "example.com"
//! - an IPv4 last-octet range: "192.168.1.1-100"
//!
//! Octet ranges are clipped to 1-255 and inverted bounds are swapped.

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use tracing::{debug, warn};
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Lowest host octet produced by a range.
pub const MIN_OCTET: u32 = 1;
/// Highest host octet produced by a range.
pub const MAX_OCTET: u32 = 255;

/// Error type for target parsing and resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("invalid target format: '{0}'")]
    InvalidFormat(String),
    #[error("failed to resolve hostname '{0}': {1}")]
    DnsResolutionFailed(String, String),
    #[error("no IP addresses found for hostname '{0}'")]
    NoAddressesFound(String),
    #[error("empty address specification")]
    Empty,
}

/// A single entry of an address specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEntry {
    /// A literal IP address.
    Address(IpAddr),
    /// A hostname to be resolved.
    Hostname(String),
    /// `prefix.start-end`, expanded over the last octet.
    OctetRange { prefix: String, start: u32, end: u32 },
}

impl TargetEntry {
    /// Parse one entry of an address spec.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TargetError::InvalidFormat(s.to_string()));
        }

        if let Some(range) = parse_octet_range(s) {
            return Ok(range);
        }

        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::Address(ip));
        }

        if is_valid_hostname(s) {
            return Ok(Self::Hostname(s.to_string()));
        }

        Err(TargetError::InvalidFormat(s.to_string()))
    }

    /// Host names this entry stands for, before resolution.
    fn hosts(&self) -> Vec<String> {
        match self {
            Self::Address(ip) => vec![ip.to_string()],
            Self::Hostname(name) => vec![name.clone()],
            Self::OctetRange { prefix, start, end } => {
                let (start, end) = clip_octets(*start, *end);
                (start..=end).map(|octet| format!("{}.{}", prefix, octet)).collect()
            }
        }
    }
}

impl fmt::Display for TargetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(ip) => write!(f, "{}", ip),
            Self::Hostname(name) => write!(f, "{}", name),
            Self::OctetRange { prefix, start, end } => {
                write!(f, "{}.{}-{}", prefix, start, end)
            }
        }
    }
}

/// A parsed address specification, entries kept in input order.
#[derive(Debug, Clone, Default)]
pub struct TargetSpec {
    entries: Vec<TargetEntry>,
}

impl TargetSpec {
    /// Parse a comma-separated address specification.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TargetError::Empty);
        }

        let entries = s
            .split(',')
            .map(TargetEntry::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TargetEntry] {
        &self.entries
    }

    /// Expand ranges, resolve hostnames and deduplicate.
    ///
    /// The returned addresses keep first-seen order. Any resolution
    /// failure aborts the whole expansion.
    pub async fn resolve(&self) -> Result<Vec<IpAddr>, TargetError> {
        let mut resolver: Option<TokioAsyncResolver> = None;
        let mut seen = HashSet::new();
        let mut addresses = Vec::new();

        for host in self.entries.iter().flat_map(TargetEntry::hosts) {
            let ip = match host.parse::<IpAddr>() {
                Ok(ip) => ip,
                Err(_) => {
                    let resolver = resolver.get_or_insert_with(system_resolver);
                    lookup_first(resolver, &host).await?
                }
            };

            if seen.insert(ip) {
                addresses.push(ip);
            }
        }

        Ok(addresses)
    }
}

impl FromStr for TargetSpec {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.entries.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Resolver following the host's own configuration (`/etc/resolv.conf`
/// and the hosts file), or the built-in defaults when that is unreadable.
fn system_resolver() -> TokioAsyncResolver {
    TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
        warn!(error = %e, "system resolver configuration unavailable, using defaults");
        TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
    })
}

async fn lookup_first(resolver: &TokioAsyncResolver, host: &str) -> Result<IpAddr, TargetError> {
    let response = resolver
        .lookup_ip(host)
        .await
        .map_err(|e| TargetError::DnsResolutionFailed(host.to_string(), e.to_string()))?;

    let ip = response
        .iter()
        .next()
        .ok_or_else(|| TargetError::NoAddressesFound(host.to_string()))?;
    debug!(host, %ip, "resolved hostname");
    Ok(ip)
}

/// Recognize `prefix.start-end` where both octets are decimal numbers.
fn parse_octet_range(s: &str) -> Option<TargetEntry> {
    let (head, end) = s.rsplit_once('-')?;
    let (prefix, start) = head.rsplit_once('.')?;
    if prefix.is_empty() || !is_decimal(start) || !is_decimal(end) {
        return None;
    }

    // Oversized values saturate and get clipped to 255 later.
    let start = start.parse::<u32>().unwrap_or(u32::MAX);
    let end = end.parse::<u32>().unwrap_or(u32::MAX);
    Some(TargetEntry::OctetRange {
        prefix: prefix.to_string(),
        start,
        end,
    })
}

/// Order the bounds and clip them into the host octet range.
fn clip_octets(start: u32, end: u32) -> (u32, u32) {
    let (low, high) = if start > end { (end, start) } else { (start, end) };
    (
        low.clamp(MIN_OCTET, MAX_OCTET),
        high.clamp(MIN_OCTET, MAX_OCTET),
    )
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Check if a string is a valid hostname.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    for label in s.split('.') {
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        if !label.chars().next().is_some_and(|c| c.is_alphanumeric()) {
            return false;
        }
        if !label.chars().last().is_some_and(|c| c.is_alphanumeric()) {
            return false;
        }
        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn test_parse_entries() {
        assert!(matches!(
            TargetEntry::parse("192.168.1.1").unwrap(),
            TargetEntry::Address(IpAddr::V4(_))
        ));
        assert!(matches!(
            TargetEntry::parse("::1").unwrap(),
            TargetEntry::Address(IpAddr::V6(_))
        ));
        assert!(matches!(
            TargetEntry::parse("my-server.example.com").unwrap(),
            TargetEntry::Hostname(_)
        ));
        assert_eq!(
            TargetEntry::parse("10.0.0.1-20").unwrap(),
            TargetEntry::OctetRange {
                prefix: "10.0.0".to_string(),
                start: 1,
                end: 20
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(TargetSpec::parse("  ").unwrap_err(), TargetError::Empty);
        assert!(matches!(
            TargetSpec::parse("10.0.0.1,,10.0.0.2"),
            Err(TargetError::InvalidFormat(_))
        ));
        assert!(matches!(
            TargetSpec::parse("bad host!"),
            Err(TargetError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_octet_clipping() {
        assert_eq!(clip_octets(1, 300), (1, 255));
        assert_eq!(clip_octets(0, 3), (1, 3));
        assert_eq!(clip_octets(9, 4), (4, 9));
        assert_eq!(clip_octets(7, 7), (7, 7));
    }

    #[tokio::test]
    async fn test_resolve_octet_range() {
        let spec = TargetSpec::parse("192.168.1.1-3").unwrap();
        assert_eq!(
            spec.resolve().await.unwrap(),
            vec![v4(192, 168, 1, 1), v4(192, 168, 1, 2), v4(192, 168, 1, 3)]
        );
    }

    #[tokio::test]
    async fn test_resolve_clips_and_swaps() {
        let spec = TargetSpec::parse("10.0.0.254-999").unwrap();
        assert_eq!(
            spec.resolve().await.unwrap(),
            vec![v4(10, 0, 0, 254), v4(10, 0, 0, 255)]
        );

        let spec = TargetSpec::parse("10.0.0.3-0").unwrap();
        assert_eq!(
            spec.resolve().await.unwrap(),
            vec![v4(10, 0, 0, 1), v4(10, 0, 0, 2), v4(10, 0, 0, 3)]
        );
    }

    #[tokio::test]
    async fn test_degenerate_range_is_single_address() {
        let spec = TargetSpec::parse("172.16.0.9-9").unwrap();
        assert_eq!(spec.resolve().await.unwrap(), vec![v4(172, 16, 0, 9)]);
    }

    #[tokio::test]
    async fn test_resolve_dedups_overlaps_in_first_seen_order() {
        let spec = TargetSpec::parse("10.1.1.5,10.1.1.4-6,10.1.1.1-2,10.1.1.5").unwrap();
        assert_eq!(
            spec.resolve().await.unwrap(),
            vec![
                v4(10, 1, 1, 5),
                v4(10, 1, 1, 4),
                v4(10, 1, 1, 6),
                v4(10, 1, 1, 1),
                v4(10, 1, 1, 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_localhost_dedups_with_literal() {
        let spec = TargetSpec::parse("localhost,127.0.0.1").unwrap();
        let addresses = spec.resolve().await.unwrap();
        assert!(addresses[0].is_loopback());
        if addresses[0] == v4(127, 0, 0, 1) {
            assert_eq!(addresses, vec![v4(127, 0, 0, 1)]);
        } else {
            assert_eq!(addresses, vec![addresses[0], v4(127, 0, 0, 1)]);
        }
    }

    #[tokio::test]
    async fn test_unresolvable_hostname_is_fatal() {
        let spec = TargetSpec::parse("127.0.0.1,no-such-host.invalid").unwrap();
        assert!(matches!(
            spec.resolve().await,
            Err(TargetError::DnsResolutionFailed(_, _)) | Err(TargetError::NoAddressesFound(_))
        ));
    }

    #[test]
    fn test_valid_hostname() {
        assert!(is_valid_hostname("example.com"));
        assert!(is_valid_hostname("my-server"));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("-invalid.com"));
        assert!(!is_valid_hostname("bad_host"));
    }
}
