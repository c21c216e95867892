//! Target specification types.
//!
//! Turns the raw address and port strings into the deduplicated lists the
//! task manager multiplies into scan tasks.

mod port;
mod target;

pub use port::{PortError, PortRange, PortSpec, MAX_PORT};
pub use target::{TargetEntry, TargetError, TargetSpec, MAX_OCTET, MIN_OCTET};

use std::net::IpAddr;

/// Expand an address spec into unique addresses, in first-seen order.
///
/// Hostnames are resolved; a failed lookup fails the whole expansion.
pub async fn expand_addresses(spec: &str) -> Result<Vec<IpAddr>, TargetError> {
    TargetSpec::parse(spec)?.resolve().await
}

/// Expand a port spec into unique ports, in first-seen order.
pub fn expand_ports(spec: &str) -> Result<Vec<u16>, PortError> {
    Ok(spec.parse::<PortSpec>()?.to_ports())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_ports() {
        assert_eq!(expand_ports("80,81,90-92").unwrap(), vec![80, 81, 90, 91, 92]);
        assert!(expand_ports("").is_err());
    }

    #[tokio::test]
    async fn test_expand_addresses() {
        let addresses = expand_addresses("127.0.0.1, 127.0.0.1").await.unwrap();
        assert_eq!(addresses, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
    }
}
