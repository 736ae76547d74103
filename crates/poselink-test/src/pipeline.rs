//! End-to-end loopback pipeline
//!
//! Drives the full path in one process:
//! trajectory → session tick → OSC over UDP loopback → receiver →
//! reconstructor → smoothing ticks.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use poselink_config::{FixedConfig, SessionConfig};
use poselink_core::{Pose, PoseLinkResult, PoseTransform};
use poselink_runtime::{PoseReceiver, SessionOptions, TelemetrySession, TickOutcome};
use poselink_visual::{receive_transform, PoseReconstructor, ReconstructorConfig};

use crate::{Trajectory, TrajectoryConfig};

/// Pipeline run configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Frames driven through the session
    pub frames: usize,

    /// Simulated time between frames
    pub frame_interval: Duration,

    /// Session send interval
    pub send_interval: Duration,

    /// Frame at which to request a reconnect
    pub reconnect_at: Option<usize>,

    /// Reconnect settle delay (real time)
    pub settle_delay: Duration,

    /// Longest wait for in-flight datagrams after the last frame
    pub drain_timeout: Duration,

    /// Simulated smoothing time after the last frame
    pub settle_ticks: usize,

    pub trajectory: TrajectoryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frames: 120,
            frame_interval: Duration::from_millis(16),
            send_interval: Duration::from_millis(33),
            reconnect_at: None,
            settle_delay: Duration::from_millis(20),
            drain_timeout: Duration::from_millis(500),
            settle_ticks: 60,
            trajectory: TrajectoryConfig::default(),
        }
    }
}

/// Result of a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    pub ticks: usize,
    pub sent: u64,
    pub throttled: u64,
    pub no_transport: u64,
    pub received: u64,
    pub dropped: u64,
    pub max_live_transports: usize,
    /// Position error between the applied pose and the last received pose
    pub final_error: f32,
    pub announced: bool,
    pub violations: Vec<String>,
}

impl PipelineResult {
    pub fn delivery_rate(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        self.received as f64 / self.sent as f64
    }

    /// Check if the run passed
    pub fn passed(&self) -> bool {
        self.violations.is_empty() && self.delivery_rate() > 0.9
    }
}

/// Loopback pipeline harness
pub struct PipelineHarness {
    config: PipelineConfig,
}

impl PipelineHarness {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> PoseLinkResult<PipelineResult> {
        let cfg = &self.config;
        let mut result = PipelineResult::default();

        let reconstructor = Arc::new(Mutex::new(PoseReconstructor::new(
            PoseTransform::default(),
            ReconstructorConfig {
                blend_ratio: 1.0,
                ..ReconstructorConfig::default()
            },
        )));

        let options = SessionOptions {
            broadcast_address: Ipv4Addr::LOCALHOST,
            settle_delay: cfg.settle_delay,
            ..SessionOptions::default()
        };
        let bind = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        let receiver = PoseReceiver::spawn(bind, options.pose_topic(), Arc::clone(&reconstructor)).await?;

        let session_config = SessionConfig::default()
            .with_send_port(receiver.local_addr().port())
            .with_send_interval(cfg.send_interval);
        let session = TelemetrySession::new(Arc::new(FixedConfig(session_config)), options);
        session.start().await?;

        let mut trajectory = Trajectory::new(cfg.trajectory.clone());
        let mut last_sent: Option<Pose> = None;
        let base = Instant::now();

        for frame in 0..cfg.frames {
            if cfg.reconnect_at == Some(frame) {
                session.reconnect();
            }

            let elapsed = cfg.frame_interval * frame as u32;
            let pose = trajectory.sample(elapsed);

            match session.tick(base + elapsed, &pose).await {
                TickOutcome::Sent => last_sent = Some(pose),
                TickOutcome::NoTransport => result.no_transport += 1,
                _ => {}
            }
            result.ticks += 1;
            result.max_live_transports = result.max_live_transports.max(session.live_transports());

            if cfg.reconnect_at == Some(frame) {
                tokio::time::sleep(cfg.settle_delay * 3).await;
            } else {
                tokio::task::yield_now().await;
            }
        }

        let stats = session.stats();
        result.sent = stats.poses_sent;
        result.throttled = stats.throttled_ticks;

        let drain_deadline = Instant::now() + cfg.drain_timeout;
        while reconstructor.lock().received_count() < result.sent && Instant::now() < drain_deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        {
            let mut r = reconstructor.lock();
            result.received = r.received_count();
            result.dropped = r.dropped_messages();

            for _ in 0..cfg.settle_ticks {
                r.tick(cfg.frame_interval);
            }

            match (r.latest_received().copied(), last_sent) {
                (Some(latest), Some(sent)) => {
                    result.final_error = r.current().position.distance(&latest.position);
                    if result.received == result.sent {
                        let expected = receive_transform(&sent);
                        if expected.position.distance(&latest.position) > 1e-3 {
                            result
                                .violations
                                .push("last received pose differs from last sent".to_string());
                        }
                    }
                }
                _ => result.violations.push("no pose made it through".to_string()),
            }
        }

        result.announced = receiver.last_announce().is_some();
        if result.max_live_transports > 1 {
            result.violations.push(format!(
                "{} live transports at once",
                result.max_live_transports
            ));
        }
        if result.dropped > 0 {
            result
                .violations
                .push(format!("{} pose messages dropped", result.dropped));
        }

        session.shutdown();
        tracing::debug!(?result, "pipeline run finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_pipeline() {
        let result = PipelineHarness::new(PipelineConfig::default()).run().await.unwrap();

        assert!(result.passed(), "{:?}", result);
        assert!(result.announced);
        // 16 ms frames against a 33 ms interval: every third frame sends
        assert_eq!(result.sent, 40);
        assert_eq!(result.throttled, 80);
        assert_eq!(result.max_live_transports, 1);
        assert!(result.final_error < 0.01);
    }

    #[tokio::test]
    async fn test_pipeline_survives_reconnect() {
        let config = PipelineConfig {
            reconnect_at: Some(40),
            ..PipelineConfig::default()
        };

        let result = PipelineHarness::new(config).run().await.unwrap();

        assert!(result.passed(), "{:?}", result);
        assert!(result.no_transport >= 1);
        assert_eq!(result.max_live_transports, 1);
    }

    #[test]
    fn test_delivery_rate() {
        let result = PipelineResult {
            sent: 10,
            received: 9,
            ..PipelineResult::default()
        };
        assert!((result.delivery_rate() - 0.9).abs() < 1e-9);
        assert!(!result.passed());
        assert_eq!(PipelineResult::default().delivery_rate(), 0.0);
    }
}
