//! Telemetry session - one outbound transport, throttled pose sends
//!
//! The session owns at most one live [`OscSender`]. Every operation that
//! replaces it drops the old sender and binds the new one inside the same
//! critical section, so a concurrent `tick` sees the old transport, the new
//! one, or none.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;

use poselink_config::{ConfigSource, SessionConfig};
use poselink_core::{Pose, PoseLinkResult};
use poselink_transport::{
    announce_payload, device_path, lan_identity, send_oneshot, LiveGauge, OscSender,
    BROADCAST_ADDRESS,
};
use poselink_wire::{OscMessage, PoseCodec};

/// Device tag used in the pose and announce topics
pub const DEFAULT_DEVICE_TAG: &str = "VRnotrame";

/// Wait between dropping the transport and re-initializing on reconnect
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Session options
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Short device name, forms `/<tag>/transform` and `/setAddress/<tag>`
    pub device_tag: String,

    /// Reconnect settle delay
    pub settle_delay: Duration,

    /// Destination address for announcements and signal broadcasts
    pub broadcast_address: Ipv4Addr,

    /// Initial state of the send gate
    pub send_enabled: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            device_tag: DEFAULT_DEVICE_TAG.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            broadcast_address: BROADCAST_ADDRESS,
            send_enabled: true,
        }
    }
}

impl SessionOptions {
    /// Pose topic, e.g. `/VRnotrame/transform`
    pub fn pose_topic(&self) -> String {
        format!("/{}/transform", self.device_tag)
    }

    /// Self-announce topic, e.g. `/setAddress/VRnotrame`
    pub fn announce_topic(&self) -> String {
        format!("/setAddress/{}", self.device_tag)
    }
}

/// Result of a single [`TelemetrySession::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TickOutcome {
    /// Pose sent
    Sent,
    /// Send interval not yet elapsed
    Throttled,
    /// Sending switched off
    Disabled,
    /// No transport (not initialized, bind failed, or reconnect pending)
    NoTransport,
    /// Encode or send failed; counted and logged
    Failed,
}

/// Session counters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub inits: u64,
    pub poses_sent: u64,
    pub throttled_ticks: u64,
    pub send_failures: u64,
    pub reconnects: u64,
    pub target_changes: u64,
}

struct SessionState {
    config: SessionConfig,
    transport: Option<Arc<OscSender>>,
    /// Target of the live transport
    current_target: Option<Ipv4Addr>,
    /// Target chosen at runtime, re-applied after reconnect
    target_override: Option<Ipv4Addr>,
    last_send: Option<Instant>,
    send_enabled: bool,
    device_path: Option<String>,
    stats: SessionStats,
}

impl SessionState {
    fn dispose(&mut self) {
        self.transport = None;
        self.current_target = None;
    }
}

struct SessionInner {
    source: Arc<dyn ConfigSource>,
    options: SessionOptions,
    pose_topic: String,
    state: Mutex<SessionState>,
    gauge: LiveGauge,
    /// Bumped under the state lock by every reconnect, explicit init and shutdown
    generation: AtomicU64,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
}

/// Telemetry session handle. Clones share the same session.
#[derive(Clone)]
pub struct TelemetrySession {
    inner: Arc<SessionInner>,
}

impl TelemetrySession {
    /// Create an uninitialized session; call [`start`](Self::start) or
    /// [`init`](Self::init) to bind a transport.
    pub fn new(source: Arc<dyn ConfigSource>, options: SessionOptions) -> Self {
        let pose_topic = options.pose_topic();
        let state = SessionState {
            config: SessionConfig::default(),
            transport: None,
            current_target: None,
            target_override: None,
            last_send: None,
            send_enabled: options.send_enabled,
            device_path: None,
            stats: SessionStats::default(),
        };

        TelemetrySession {
            inner: Arc::new(SessionInner {
                source,
                options,
                pose_topic,
                state: Mutex::new(state),
                gauge: LiveGauge::new(),
                generation: AtomicU64::new(0),
                reconnect_task: Mutex::new(None),
            }),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    pub fn pose_topic(&self) -> &str {
        &self.inner.pose_topic
    }

    /// Resolve the configuration and initialize
    pub async fn start(&self) -> PoseLinkResult<()> {
        let config = self.inner.source.resolve();
        self.init(config).await
    }

    /// Replace the transport with one bound to `config`'s target and
    /// announce this device. Clears any runtime target override.
    /// Cancels any pending reconnect.
    pub async fn init(&self, config: SessionConfig) -> PoseLinkResult<()> {
        {
            let mut state = self.inner.state.lock();
            state.target_override = None;
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(task) = self.inner.reconnect_task.lock().take() {
            task.abort();
        }
        self.init_inner(config, None, None).await.map(|_| ())
    }

    /// Returns `Ok(false)` when a newer reconnect superseded this one
    async fn init_inner(
        &self,
        config: SessionConfig,
        generation: Option<u64>,
        target_override: Option<Ipv4Addr>,
    ) -> PoseLinkResult<bool> {
        let send_port = config.send_port;
        let lan_ip = lan_identity(self.inner.options.broadcast_address);
        let payload = {
            let mut state = self.inner.state.lock();
            if let Some(generation) = generation {
                if self.inner.generation.load(Ordering::SeqCst) != generation {
                    return Ok(false);
                }
            }

            state.dispose();
            state.stats.inits += 1;
            let target_ip = target_override.unwrap_or(config.target_address);
            let target = SocketAddrV4::new(target_ip, config.send_port);
            state.config = config;

            let sender = match OscSender::bind_tracked(target, &self.inner.gauge) {
                Ok(sender) => sender,
                Err(e) => {
                    tracing::warn!(%target, "telemetry init failed: {}", e);
                    return Err(e);
                }
            };

            // The sender's own address is loopback for a loopback target
            let sender_ip = match sender.local_addr().ip() {
                std::net::IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
                _ => None,
            };
            state.device_path = device_path(lan_ip.or(sender_ip));
            state.transport = Some(Arc::new(sender));
            state.current_target = Some(target_ip);
            if target_override.is_some() {
                state.target_override = target_override;
            }

            tracing::info!(
                %target,
                device = state.device_path.as_deref().unwrap_or("unknown"),
                "telemetry initialized"
            );
            announce_payload(state.device_path.as_deref())
        };

        let announce = OscMessage::with_string(self.inner.options.announce_topic(), payload);
        let dest = SocketAddrV4::new(self.inner.options.broadcast_address, send_port);
        if let Err(e) = send_oneshot(&announce, dest).await {
            tracing::warn!(%dest, "announce failed: {}", e);
        }

        Ok(true)
    }

    /// Send `pose` on the pose topic if sending is enabled, a transport
    /// exists and the send interval has elapsed since the last send.
    pub async fn tick(&self, now: Instant, pose: &Pose) -> TickOutcome {
        let transport = {
            let mut state = self.inner.state.lock();
            if !state.send_enabled {
                return TickOutcome::Disabled;
            }
            let Some(transport) = state.transport.clone() else {
                return TickOutcome::NoTransport;
            };
            if let Some(last) = state.last_send {
                if now.saturating_duration_since(last) < state.config.send_interval {
                    state.stats.throttled_ticks += 1;
                    return TickOutcome::Throttled;
                }
            }
            state.last_send = Some(now);
            transport
        };

        match self.send_on(&transport, &self.inner.pose_topic, pose).await {
            Ok(()) => {
                self.inner.state.lock().stats.poses_sent += 1;
                TickOutcome::Sent
            }
            Err(e) => {
                self.inner.state.lock().stats.send_failures += 1;
                tracing::warn!(target = %transport.target(), "pose send failed: {}", e);
                TickOutcome::Failed
            }
        }
    }

    async fn send_on(&self, transport: &OscSender, topic: &str, pose: &Pose) -> PoseLinkResult<()> {
        let bytes = PoseCodec::to_osc(topic, pose)?;
        transport.send_bytes(&bytes).await?;
        Ok(())
    }

    /// Send `pose` on `topic` over the session transport right away.
    ///
    /// Returns `Ok(false)` without a transport. Ignores the send gate and
    /// the pose interval.
    pub async fn send_pose_on(&self, topic: &str, pose: &Pose) -> PoseLinkResult<bool> {
        let Some(transport) = self.inner.state.lock().transport.clone() else {
            return Ok(false);
        };

        if let Err(e) = self.send_on(&transport, topic, pose).await {
            self.inner.state.lock().stats.send_failures += 1;
            return Err(e);
        }
        Ok(true)
    }

    /// Point the transport at `address` on the configured send port.
    ///
    /// No-op when already bound there. The address is kept as a runtime
    /// override and re-applied after every reconnect.
    pub fn set_target(&self, address: Ipv4Addr) -> PoseLinkResult<()> {
        let mut state = self.inner.state.lock();
        state.target_override = Some(address);

        if state.current_target == Some(address) && state.transport.is_some() {
            return Ok(());
        }

        state.dispose();
        let target = SocketAddrV4::new(address, state.config.send_port);
        let sender = OscSender::bind_tracked(target, &self.inner.gauge).map_err(|e| {
            tracing::warn!(%target, "cannot retarget: {}", e);
            e
        })?;

        state.transport = Some(Arc::new(sender));
        state.current_target = Some(address);
        state.stats.target_changes += 1;
        tracing::info!(%target, "telemetry target changed");
        Ok(())
    }

    /// Drop the transport now and re-initialize after the settle delay.
    ///
    /// A newer call supersedes a pending one; only the latest re-runs
    /// config resolution and init.
    pub fn reconnect(&self) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!("reconnect requested outside a tokio runtime; ignored");
                return;
            }
        };

        let generation = {
            let mut state = self.inner.state.lock();
            state.dispose();
            state.stats.reconnects += 1;
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        tracing::info!(generation, "telemetry reconnect scheduled");

        let session = self.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(session.inner.options.settle_delay).await;

            if session.inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let config = session.inner.source.resolve();
            let target_override = session.inner.state.lock().target_override;

            match session.init_inner(config, Some(generation), target_override).await {
                Ok(true) => tracing::info!(generation, "telemetry reconnected"),
                Ok(false) => tracing::debug!(generation, "reconnect superseded"),
                Err(e) => tracing::warn!(generation, "reconnect failed: {}", e),
            }
        });

        if let Some(previous) = self.inner.reconnect_task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// One-shot broadcast of `payload` on `topic` over a transient socket
    pub async fn broadcast_signal(&self, topic: &str, payload: &str, port: u16) -> PoseLinkResult<()> {
        let message = OscMessage::with_string(topic, payload);
        let dest = SocketAddrV4::new(self.inner.options.broadcast_address, port);

        send_oneshot(&message, dest).await.map_err(|e| {
            tracing::warn!(%dest, topic, "signal broadcast failed: {}", e);
            e
        })
    }

    pub fn enable_send(&self) {
        self.set_send_enabled(true);
    }

    pub fn disable_send(&self) {
        self.set_send_enabled(false);
    }

    pub fn set_send_enabled(&self, enabled: bool) {
        let mut state = self.inner.state.lock();
        if state.send_enabled != enabled {
            tracing::info!(enabled, "telemetry send gate changed");
        }
        state.send_enabled = enabled;
    }

    pub fn is_send_enabled(&self) -> bool {
        self.inner.state.lock().send_enabled
    }

    /// Drop the transport and cancel any pending reconnect
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            state.dispose();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(task) = self.inner.reconnect_task.lock().take() {
            task.abort();
        }
        tracing::info!("telemetry session shut down");
    }

    /// Configuration of the most recent init
    pub fn config(&self) -> SessionConfig {
        self.inner.state.lock().config.clone()
    }

    /// Target IP of the live transport
    pub fn current_target(&self) -> Option<Ipv4Addr> {
        self.inner.state.lock().current_target
    }

    pub fn target_override(&self) -> Option<Ipv4Addr> {
        self.inner.state.lock().target_override
    }

    /// Path-style local identity, e.g. `/192.168.1.20`
    pub fn device_path(&self) -> Option<String> {
        self.inner.state.lock().device_path.clone()
    }

    pub fn has_transport(&self) -> bool {
        self.inner.state.lock().transport.is_some()
    }

    /// Senders created by this session that are still alive
    pub fn live_transports(&self) -> usize {
        self.inner.gauge.live()
    }

    pub fn stats(&self) -> SessionStats {
        self.inner.state.lock().stats.clone()
    }
}
