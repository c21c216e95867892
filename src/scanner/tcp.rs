//! TCP connect probe.
//!
//! Completes a full handshake through the operating system's socket API
//! and closes the connection straight away. Needs no privileges.

use crate::scanner::traits::{PortState, Probe, ScanType};
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// TCP connect probe.
///
/// - success: [`PortState::Opened`]
/// - connection refused: [`PortState::Closed`]
/// - timeout or any other failure: [`PortState::Unresponsive`]
///
/// Each call makes exactly one attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectProbe;

impl ConnectProbe {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Probe for ConnectProbe {
    fn scan_type(&self) -> ScanType {
        ScanType::Connect
    }

    async fn probe(&self, address: IpAddr, port: u16, limit: Duration) -> PortState {
        let addr = SocketAddr::new(address, port);
        match timeout(limit, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                PortState::Opened
            }
            Ok(Err(e)) => classify_error(&e),
            Err(_) => PortState::Unresponsive,
        }
    }
}

/// Map a failed connect to a port state.
fn classify_error(e: &io::Error) -> PortState {
    if e.kind() == io::ErrorKind::ConnectionRefused
        || e.to_string().to_lowercase().contains("refused")
    {
        PortState::Closed
    } else {
        PortState::Unresponsive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn test_listening_port_is_opened() {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let state = ConnectProbe::new()
            .probe(LOCALHOST, port, Duration::from_secs(2))
            .await;
        assert_eq!(state, PortState::Opened);
    }

    #[tokio::test]
    async fn test_refused_port_is_closed() {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let state = ConnectProbe::new()
            .probe(LOCALHOST, port, Duration::from_secs(2))
            .await;
        assert_eq!(state, PortState::Closed);
    }

    #[tokio::test]
    async fn test_elapsed_timeout_is_unresponsive() {
        // A remote handshake cannot finish within a nanosecond.
        let target = IpAddr::V4(Ipv4Addr::new(10, 255, 255, 1));
        let state = ConnectProbe::new()
            .probe(target, 81, Duration::from_nanos(1))
            .await;
        assert_eq!(state, PortState::Unresponsive);
    }

    #[test]
    fn test_classify_error() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(classify_error(&refused), PortState::Closed);

        let other = io::Error::new(io::ErrorKind::Other, "No route to host");
        assert_eq!(classify_error(&other), PortState::Unresponsive);
    }
}
