//! Auxiliary pose streams sharing the session transport

use std::time::{Duration, Instant};

use poselink_core::{Pose, PoseLinkResult, ReferenceFrame};

use crate::{TelemetrySession, TickOutcome};

/// Topic of the emergency stream
pub const EMERGENCY_TOPIC: &str = "/emergency/transform";

/// Default cadence of auxiliary streams
pub const DEFAULT_AUX_INTERVAL: Duration = Duration::from_millis(100);

/// A pose stream with its own topic and cadence.
///
/// Poses are given in world space and expressed in `frame` before sending.
/// Sends go through [`TelemetrySession::send_pose_on`], so the stream has no
/// socket of its own and is silent while the session has no transport.
#[derive(Debug, Clone)]
pub struct AuxiliaryStream {
    topic: String,
    interval: Duration,
    auto_send: bool,
    frame: ReferenceFrame,
    last_send: Option<Instant>,
    sent: u64,
}

impl AuxiliaryStream {
    pub fn new(topic: impl Into<String>, interval: Duration) -> Self {
        Self {
            topic: topic.into(),
            interval,
            auto_send: false,
            frame: ReferenceFrame::default(),
            last_send: None,
            sent: 0,
        }
    }

    /// Emergency stream: `/emergency/transform` every 100 ms, manual until
    /// auto-send is switched on
    pub fn emergency() -> Self {
        Self::new(EMERGENCY_TOPIC, DEFAULT_AUX_INTERVAL)
    }

    pub fn with_frame(mut self, frame: ReferenceFrame) -> Self {
        self.frame = frame;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn frame(&self) -> &ReferenceFrame {
        &self.frame
    }

    pub fn set_frame(&mut self, frame: ReferenceFrame) {
        self.frame = frame;
    }

    pub fn is_auto_send(&self) -> bool {
        self.auto_send
    }

    pub fn set_auto_send(&mut self, enabled: bool) {
        self.auto_send = enabled;
    }

    /// Messages delivered to the transport
    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    /// Send on cadence while auto-send is on
    pub async fn tick(&mut self, session: &TelemetrySession, now: Instant, world: &Pose) -> TickOutcome {
        if !self.auto_send {
            return TickOutcome::Disabled;
        }
        if let Some(last) = self.last_send {
            if now.saturating_duration_since(last) < self.interval {
                return TickOutcome::Throttled;
            }
        }
        self.last_send = Some(now);

        match self.send_now(session, world).await {
            Ok(true) => TickOutcome::Sent,
            Ok(false) => TickOutcome::NoTransport,
            Err(e) => {
                tracing::warn!(topic = %self.topic, "auxiliary send failed: {}", e);
                TickOutcome::Failed
            }
        }
    }

    /// Send immediately, ignoring cadence and auto-send.
    ///
    /// Returns `Ok(false)` when the session has no transport.
    pub async fn send_now(&mut self, session: &TelemetrySession, world: &Pose) -> PoseLinkResult<bool> {
        let local = self.frame.to_local_pose(world);
        let sent = session.send_pose_on(&self.topic, &local).await?;
        if sent {
            self.sent += 1;
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    use poselink_config::{FixedConfig, SessionConfig};
    use poselink_core::{Position3D, PoseTransform, Rotation3D};
    use poselink_transport::OscReceiver;
    use poselink_wire::PoseCodec;

    use crate::SessionOptions;

    async fn session_to(port: u16) -> TelemetrySession {
        let config = SessionConfig::default().with_send_port(port);
        let session = TelemetrySession::new(
            Arc::new(FixedConfig(config.clone())),
            SessionOptions {
                broadcast_address: Ipv4Addr::LOCALHOST,
                ..SessionOptions::default()
            },
        );
        session.init(config).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_emergency_stream_sends_local_pose() {
        let receiver = OscReceiver::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let session = session_to(receiver.local_addr().port()).await;
        // Skip the announcement
        receiver.recv().await.unwrap();

        let mut stream = AuxiliaryStream::emergency()
            .with_frame(ReferenceFrame::new(Position3D::new(1.0, 0.0, 0.0), Rotation3D::identity()));
        let mut world = Pose::default();
        world.head = PoseTransform::new(Position3D::new(1.5, 1.0, 0.0), Rotation3D::identity());

        assert!(stream.send_now(&session, &world).await.unwrap());

        let (msg, _) = receiver.recv().await.unwrap();
        assert_eq!(msg.address, EMERGENCY_TOPIC);
        let pose = PoseCodec::from_osc(&msg).unwrap();
        assert!(pose.head.position.distance(&Position3D::new(1.0, 2.0, 0.0)) < 1e-4);
        assert_eq!(stream.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_tick_respects_auto_send_and_cadence() {
        let receiver = OscReceiver::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let session = session_to(receiver.local_addr().port()).await;
        let mut stream = AuxiliaryStream::emergency();
        let pose = Pose::default();
        let t0 = Instant::now();

        assert_eq!(stream.tick(&session, t0, &pose).await, TickOutcome::Disabled);

        stream.set_auto_send(true);
        assert_eq!(stream.tick(&session, t0, &pose).await, TickOutcome::Sent);
        assert_eq!(
            stream.tick(&session, t0 + Duration::from_millis(50), &pose).await,
            TickOutcome::Throttled
        );
        assert_eq!(
            stream.tick(&session, t0 + Duration::from_millis(100), &pose).await,
            TickOutcome::Sent
        );
        assert_eq!(stream.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_stream_is_silent_without_transport() {
        let session = TelemetrySession::new(
            Arc::new(FixedConfig(SessionConfig::default())),
            SessionOptions::default(),
        );
        let mut stream = AuxiliaryStream::emergency();
        stream.set_auto_send(true);

        let outcome = stream.tick(&session, Instant::now(), &Pose::default()).await;
        assert_eq!(outcome, TickOutcome::NoTransport);
        assert_eq!(stream.sent_count(), 0);
    }
}
