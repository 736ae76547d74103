//! One-shot sends and local identity
//!
//! Broadcasts never reuse a periodic sender; each call opens a transient
//! socket and drops it after a single datagram.

use std::net::{Ipv4Addr, SocketAddrV4};

use tokio::net::UdpSocket;

use poselink_core::{PoseLinkError, PoseLinkResult};
use poselink_wire::OscMessage;

/// Limited broadcast address
pub const BROADCAST_ADDRESS: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Payload announced when the local address is unknown
pub const UNKNOWN_DEVICE: &str = "unknown";

/// Route probes tried when the preferred destination only reaches loopback:
/// a typical home LAN gateway, then the default route
const ROUTE_PROBES: [Ipv4Addr; 2] = [Ipv4Addr::new(192, 168, 0, 1), Ipv4Addr::new(8, 8, 8, 8)];

/// Send a single message over a transient socket
pub async fn send_oneshot(message: &OscMessage, dest: SocketAddrV4) -> PoseLinkResult<()> {
    let bytes = message.encode()?;

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .map_err(|e| PoseLinkError::TransportBind(e.to_string()))?;
    if dest.ip().is_broadcast() {
        socket
            .set_broadcast(true)
            .map_err(|e| PoseLinkError::TransportBind(e.to_string()))?;
    }

    socket
        .send_to(&bytes, dest)
        .await
        .map_err(|e| PoseLinkError::TransportError(format!("{}: {}", dest, e)))?;

    tracing::trace!(%dest, address = %message.address, "one-shot sent");
    Ok(())
}

/// Broadcast a single message on `port`
pub async fn broadcast(message: &OscMessage, port: u16) -> PoseLinkResult<()> {
    send_oneshot(message, SocketAddrV4::new(BROADCAST_ADDRESS, port)).await
}

/// Local IPv4 of the interface that routes toward `target`.
///
/// Uses an unsent connected socket, so no traffic leaves the host.
pub fn local_ipv4_toward(target: Ipv4Addr) -> Option<Ipv4Addr> {
    let socket = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    if target.is_broadcast() {
        socket.set_broadcast(true).ok()?;
    }
    socket.connect((target, 9)).ok()?;

    match socket.local_addr().ok()?.ip() {
        std::net::IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// First usable identity: not loopback and not unspecified
pub fn pick_identity<I>(candidates: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = Option<Ipv4Addr>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|ip| !ip.is_loopback() && !ip.is_unspecified())
}

/// LAN IPv4 of this device.
///
/// Tries the interface routing toward `preferred`, then the route probes.
/// `None` when only loopback is reachable.
pub fn lan_identity(preferred: Ipv4Addr) -> Option<Ipv4Addr> {
    let probes = std::iter::once(preferred).chain(ROUTE_PROBES);
    pick_identity(probes.map(local_ipv4_toward))
}

/// Path-style device identity, e.g. `/192.168.1.20`
pub fn device_path(ip: Option<Ipv4Addr>) -> Option<String> {
    ip.map(|ip| format!("/{}", ip))
}

/// Announce payload: the device path without its leading slash
pub fn announce_payload(path: Option<&str>) -> String {
    match path.map(|p| p.trim_start_matches('/')) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => UNKNOWN_DEVICE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OscReceiver;
    use std::net::SocketAddr;

    #[test]
    fn test_announce_payload_strips_prefix() {
        let path = device_path(Some(Ipv4Addr::new(192, 168, 1, 20)));
        assert_eq!(path.as_deref(), Some("/192.168.1.20"));
        assert_eq!(announce_payload(path.as_deref()), "192.168.1.20");
    }

    #[test]
    fn test_announce_payload_unknown() {
        assert_eq!(announce_payload(None), UNKNOWN_DEVICE);
        assert_eq!(announce_payload(Some("/")), UNKNOWN_DEVICE);
    }

    #[test]
    fn test_local_ipv4_toward_loopback() {
        assert_eq!(local_ipv4_toward(Ipv4Addr::LOCALHOST), Some(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_pick_identity_skips_loopback() {
        let lan = Ipv4Addr::new(192, 168, 1, 20);
        assert_eq!(pick_identity([Some(Ipv4Addr::LOCALHOST), None, Some(lan)]), Some(lan));
        assert_eq!(pick_identity([Some(Ipv4Addr::UNSPECIFIED), Some(Ipv4Addr::LOCALHOST)]), None);
    }

    #[test]
    fn test_lan_identity_is_never_loopback() {
        if let Some(ip) = lan_identity(Ipv4Addr::LOCALHOST) {
            assert!(!ip.is_loopback());
            assert_eq!(local_ipv4_toward(Ipv4Addr::LOCALHOST), Some(Ipv4Addr::LOCALHOST));
        }
    }

    #[tokio::test]
    async fn test_oneshot_delivers() {
        let receiver = OscReceiver::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let SocketAddr::V4(dest) = receiver.local_addr() else {
            unreachable!("bound to IPv4");
        };

        send_oneshot(&OscMessage::with_string("/Direct/Windows", "Trigger"), dest)
            .await
            .unwrap();

        let (msg, _) = receiver.recv().await.unwrap();
        assert_eq!(msg.address, "/Direct/Windows");
        assert_eq!(msg.first_string(), Some("Trigger"));
    }

    // Requires a network interface that accepts limited broadcast
    #[tokio::test]
    #[ignore]
    async fn test_broadcast_send() {
        let result = broadcast(&OscMessage::with_string("/probe", "x"), 20999).await;
        match result {
            Ok(()) => println!("broadcast sent"),
            Err(e) => println!("broadcast failed (expected in some environments): {}", e),
        }
    }
}
