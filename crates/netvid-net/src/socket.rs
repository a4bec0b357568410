//! Endpoint parsing and UDP socket setup.

use netvid_core::NetvidError;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::info;

pub const RECV_BUFFER_BYTES: usize = 1024 * 1024;

/// Parses `host[:port]`, defaulting to [`netvid_core::protocol::DEFAULT_PORT`] when
/// no port is given, and resolves `host` through the platform resolver, taking the
/// first record.
pub async fn parse_endpoint(endpoint: &str) -> Result<SocketAddr, NetvidError> {
    let (host, port) = split_host_port(endpoint)?;
    let lookup = format!("{host}:{port}");
    let mut addrs = tokio::net::lookup_host(&lookup)
        .await
        .map_err(|_| NetvidError::InvalidEndpoint(endpoint.to_string()))?;
    addrs
        .next()
        .ok_or_else(|| NetvidError::InvalidEndpoint(endpoint.to_string()))
}

fn split_host_port(endpoint: &str) -> Result<(String, u16), NetvidError> {
    match endpoint.rsplit_once(':') {
        Some((host, port_str)) if !port_str.is_empty() && port_str.bytes().all(|b| b.is_ascii_digit()) => {
            let port: u16 = port_str
                .parse()
                .map_err(|_| NetvidError::InvalidEndpoint(endpoint.to_string()))?;
            Ok((host.to_string(), port))
        }
        _ => Ok((endpoint.to_string(), netvid_core::protocol::DEFAULT_PORT)),
    }
}

/// Binds a UDP socket to `endpoint`, requesting a 1 MiB receive buffer and
/// logging whatever size the kernel actually grants.
pub async fn bind(endpoint: &str) -> Result<UdpSocket, NetvidError> {
    let addr = parse_endpoint(endpoint).await?;

    let raw = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    raw.set_nonblocking(true)?;
    raw.set_recv_buffer_size(RECV_BUFFER_BYTES)?;
    raw.bind(&addr.into())?;
    let actual = raw.recv_buffer_size()?;
    info!(requested = RECV_BUFFER_BYTES, actual, "UDP receive buffer size");

    let std_socket: std::net::UdpSocket = raw.into();
    UdpSocket::from_std(std_socket).map_err(NetvidError::Socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_port_applied_when_missing() {
        let addr = parse_endpoint("127.0.0.1").await.unwrap();
        assert_eq!(addr.port(), netvid_core::protocol::DEFAULT_PORT);
    }

    #[tokio::test]
    async fn explicit_port_is_honored() {
        let addr = parse_endpoint("127.0.0.1:9999").await.unwrap();
        assert_eq!(addr.port(), 9999);
    }

    #[tokio::test]
    async fn garbage_host_is_invalid_endpoint() {
        let err = parse_endpoint("not a host::::").await.unwrap_err();
        assert!(matches!(err, NetvidError::InvalidEndpoint(_)));
    }
}
