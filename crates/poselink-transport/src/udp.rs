//! UDP transport implementation

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use poselink_core::{PoseLinkError, PoseLinkResult};
use poselink_wire::{OscMessage, MAX_PACKET_SIZE};

/// Counts senders that are currently alive
#[derive(Clone, Debug, Default)]
pub struct LiveGauge(Arc<AtomicUsize>);

impl LiveGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live tracked senders
    pub fn live(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn track(&self) -> LiveToken {
        self.0.fetch_add(1, Ordering::SeqCst);
        LiveToken(Arc::clone(&self.0))
    }
}

#[derive(Debug)]
struct LiveToken(Arc<AtomicUsize>);

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Outbound OSC transport bound to a single target.
///
/// Dropping the sender disposes its socket.
#[derive(Debug)]
pub struct OscSender {
    socket: UdpSocket,
    target: SocketAddrV4,
    local_addr: SocketAddr,
    _live: Option<LiveToken>,
}

impl OscSender {
    /// Bind an ephemeral socket and connect it to `target`.
    ///
    /// Synchronous so callers can replace a sender inside a short critical
    /// section. Must run inside a tokio runtime.
    pub fn bind(target: SocketAddrV4) -> PoseLinkResult<Self> {
        Self::bind_inner(target, None)
    }

    /// Like [`OscSender::bind`], counted in `gauge` while alive
    pub fn bind_tracked(target: SocketAddrV4, gauge: &LiveGauge) -> PoseLinkResult<Self> {
        Self::bind_inner(target, Some(gauge))
    }

    fn bind_inner(target: SocketAddrV4, gauge: Option<&LiveGauge>) -> PoseLinkResult<Self> {
        if target.ip().is_unspecified() || target.port() == 0 {
            return Err(PoseLinkError::TransportBind(format!(
                "invalid target {}",
                target
            )));
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(PoseLinkError::TransportBind(
                "no tokio runtime available".into(),
            ));
        }

        let bind_err = |e: std::io::Error| PoseLinkError::TransportBind(format!("{}: {}", target, e));

        let std_socket = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(bind_err)?;
        if target.ip().is_broadcast() {
            std_socket.set_broadcast(true).map_err(bind_err)?;
        }
        std_socket.connect(target).map_err(bind_err)?;
        std_socket.set_nonblocking(true).map_err(bind_err)?;

        let local_addr = std_socket.local_addr().map_err(bind_err)?;
        let socket = UdpSocket::from_std(std_socket).map_err(bind_err)?;

        Ok(OscSender {
            socket,
            target,
            local_addr,
            _live: gauge.map(LiveGauge::track),
        })
    }

    /// Target endpoint
    pub fn target(&self) -> SocketAddrV4 {
        self.target
    }

    /// Local address; the IP is the interface routing toward the target
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send an OSC message to the target
    pub async fn send(&self, message: &OscMessage) -> PoseLinkResult<usize> {
        let bytes = message.encode()?;
        self.send_bytes(&bytes).await
    }

    /// Send raw datagram bytes to the target
    pub async fn send_bytes(&self, bytes: &[u8]) -> PoseLinkResult<usize> {
        self.socket
            .send(bytes)
            .await
            .map_err(|e| PoseLinkError::TransportError(format!("{}: {}", self.target, e)))
    }
}

/// Inbound OSC transport
pub struct OscReceiver {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl OscReceiver {
    /// Bind to a local address
    pub async fn bind(addr: SocketAddr) -> PoseLinkResult<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| PoseLinkError::TransportBind(format!("{}: {}", addr, e)))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| PoseLinkError::TransportBind(e.to_string()))?;

        Ok(OscReceiver {
            socket: Arc::new(socket),
            local_addr,
        })
    }

    /// Get local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive one message. Malformed datagrams surface as errors.
    pub async fn recv(&self) -> PoseLinkResult<(OscMessage, SocketAddr)> {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let (len, addr) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| PoseLinkError::TransportError(e.to_string()))?;

        let message = OscMessage::parse(&buf[..len])?;
        Ok((message, addr))
    }

    /// Get a clone of the socket for concurrent operations
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}

/// Parsed message receiver channel
pub type MessageReceiver = mpsc::Receiver<(OscMessage, SocketAddr)>;

/// Start a background receive loop; malformed datagrams are dropped.
///
/// The loop holds the socket until the returned handle is aborted or a
/// send finds the channel closed.
pub fn start_receive_loop(
    socket: Arc<UdpSocket>,
    buffer_size: usize,
) -> (MessageReceiver, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(buffer_size);

    let task = tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, addr)) => match OscMessage::parse(&buf[..len]) {
                    Ok(message) => {
                        if tx.send((message, addr)).await.is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(e) => {
                        tracing::debug!(%addr, "dropping datagram: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("UDP receive error: {}", e);
                }
            }
        }
    });

    (rx, task)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn loopback_receiver() -> OscReceiver {
        OscReceiver::bind("127.0.0.1:0".parse().unwrap()).await.unwrap()
    }

    fn v4(addr: SocketAddr) -> SocketAddrV4 {
        match addr {
            SocketAddr::V4(a) => a,
            SocketAddr::V6(_) => unreachable!("bound to IPv4"),
        }
    }

    #[tokio::test]
    async fn test_sender_reaches_receiver() {
        let receiver = loopback_receiver().await;
        let sender = OscSender::bind(v4(receiver.local_addr())).unwrap();

        sender
            .send(&OscMessage::with_string("/test", "hello"))
            .await
            .unwrap();

        let (msg, from) = receiver.recv().await.unwrap();
        assert_eq!(msg.address, "/test");
        assert_eq!(msg.first_string(), Some("hello"));
        assert_eq!(from.port(), sender.local_addr().port());
    }

    #[tokio::test]
    async fn test_gauge_tracks_lifetime() {
        let gauge = LiveGauge::new();
        let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9);

        let a = OscSender::bind_tracked(target, &gauge).unwrap();
        let b = OscSender::bind_tracked(target, &gauge).unwrap();
        assert_eq!(gauge.live(), 2);

        drop(a);
        assert_eq!(gauge.live(), 1);
        drop(b);
        assert_eq!(gauge.live(), 0);
    }

    #[tokio::test]
    async fn test_bind_rejects_unspecified_target() {
        let result = OscSender::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 17200));
        assert!(matches!(result, Err(PoseLinkError::TransportBind(_))));
    }

    #[test]
    fn test_bind_outside_runtime_is_an_error() {
        let result = OscSender::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 17200));
        assert!(matches!(result, Err(PoseLinkError::TransportBind(_))));
    }

    #[tokio::test]
    async fn test_receive_loop_skips_garbage() {
        let receiver = loopback_receiver().await;
        let target = v4(receiver.local_addr());
        let (mut rx, task) = start_receive_loop(receiver.socket(), 8);

        let sender = OscSender::bind(target).unwrap();
        sender.send_bytes(b"not osc").await.unwrap();
        sender
            .send(&OscMessage::with_string("/ok", "1"))
            .await
            .unwrap();

        let (msg, _) = rx.recv().await.unwrap();
        assert_eq!(msg.address, "/ok");
        task.abort();
    }

    #[tokio::test]
    async fn test_aborted_loop_releases_socket() {
        let receiver = loopback_receiver().await;
        let addr = receiver.local_addr();
        let (_rx, task) = start_receive_loop(receiver.socket(), 8);
        drop(receiver);

        task.abort();
        let _ = task.await;

        UdpSocket::bind(addr).await.unwrap();
    }
}
