//! Pose reconstruction - drives a local proxy from received poses

use std::time::Duration;

use poselink_core::{Pose, PoseLinkResult, PoseTransform, Position3D};
use poselink_wire::{OscMessage, PoseCodec};

use crate::{smooth_damp, smooth_rotation};

/// Reconstructor configuration
#[derive(Debug, Clone)]
pub struct ReconstructorConfig {
    /// Position smoothing time; zero snaps
    pub smooth_time: Duration,

    /// Initial blend between rest pose (0) and received pose (1)
    pub blend_ratio: f32,

    /// Rotation converges this many times faster than position
    pub rotation_catch_up: f32,
}

impl Default for ReconstructorConfig {
    fn default() -> Self {
        Self {
            smooth_time: Duration::from_millis(100),
            blend_ratio: 0.0,
            rotation_catch_up: 3.0,
        }
    }
}

/// Reconstructor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructorState {
    /// No pose received yet; ticks do nothing
    Idle,
    /// At least one pose received; every tick smooths
    Tracking,
}

/// Map a decoded pose onto the proxy transform.
///
/// Protocol convention of the sending side: X is mirrored, height is
/// dropped, and only the heading of the head rotation is kept.
pub fn receive_transform(pose: &Pose) -> PoseTransform {
    let head = &pose.head;
    PoseTransform {
        position: Position3D::new(-head.position.x, 0.0, head.position.z),
        rotation: head.rotation.normalize().yaw_only(),
    }
}

/// Receive-side state machine
#[derive(Debug, Clone)]
pub struct PoseReconstructor {
    config: ReconstructorConfig,

    /// Rest pose blended against
    default_pose: PoseTransform,

    /// Most recent received target (None while idle)
    latest: Option<PoseTransform>,

    /// Pose applied to the proxy
    current: PoseTransform,

    /// Position filter state
    velocity: Position3D,

    blend_ratio: f32,
    received: u64,
    dropped: u64,
}

impl PoseReconstructor {
    /// Create a reconstructor resting at `default_pose`
    pub fn new(default_pose: PoseTransform, config: ReconstructorConfig) -> Self {
        let blend_ratio = config.blend_ratio.clamp(0.0, 1.0);
        Self {
            config,
            default_pose,
            latest: None,
            current: default_pose,
            velocity: Position3D::zero(),
            blend_ratio,
            received: 0,
            dropped: 0,
        }
    }

    pub fn state(&self) -> ReconstructorState {
        if self.latest.is_some() {
            ReconstructorState::Tracking
        } else {
            ReconstructorState::Idle
        }
    }

    /// Re-capture the rest pose; the applied pose keeps moving from where it is
    pub fn capture_default(&mut self, default_pose: PoseTransform) {
        self.default_pose = default_pose;
    }

    pub fn default_pose(&self) -> &PoseTransform {
        &self.default_pose
    }

    pub fn latest_received(&self) -> Option<&PoseTransform> {
        self.latest.as_ref()
    }

    /// Pose currently applied to the proxy
    pub fn current(&self) -> &PoseTransform {
        &self.current
    }

    pub fn blend_ratio(&self) -> f32 {
        self.blend_ratio
    }

    /// Takes effect on the next tick
    pub fn set_blend_ratio(&mut self, ratio: f32) {
        self.blend_ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
    }

    pub fn smooth_time(&self) -> Duration {
        self.config.smooth_time
    }

    pub fn set_smooth_time(&mut self, smooth_time: Duration) {
        self.config.smooth_time = smooth_time;
    }

    /// Poses accepted since creation
    pub fn received_count(&self) -> u64 {
        self.received
    }

    /// Messages dropped as malformed
    pub fn dropped_messages(&self) -> u64 {
        self.dropped
    }

    /// Ingest a decoded pose
    pub fn on_decoded_pose(&mut self, pose: &Pose) {
        if self.latest.is_none() {
            tracing::debug!("first pose received; tracking");
        }
        self.latest = Some(receive_transform(pose));
        self.received += 1;
    }

    /// Decode and ingest a pose body. Malformed bodies leave state untouched.
    pub fn on_message(&mut self, body: &str) -> PoseLinkResult<()> {
        match PoseCodec::decode(body) {
            Ok(pose) => {
                self.on_decoded_pose(&pose);
                Ok(())
            }
            Err(e) => {
                self.dropped += 1;
                tracing::warn!("pose parse error: {}", e);
                Err(e)
            }
        }
    }

    /// Decode and ingest the pose carried by an OSC message
    pub fn on_osc(&mut self, message: &OscMessage) -> PoseLinkResult<()> {
        match PoseCodec::from_osc(message) {
            Ok(pose) => {
                self.on_decoded_pose(&pose);
                Ok(())
            }
            Err(e) => {
                self.dropped += 1;
                tracing::warn!(address = %message.address, "pose parse error: {}", e);
                Err(e)
            }
        }
    }

    /// Blend target for the current ratio, if tracking
    pub fn blended_target(&self) -> Option<PoseTransform> {
        self.latest
            .map(|latest| self.default_pose.lerp(&latest, self.blend_ratio))
    }

    /// Advance smoothing by `dt` and return the applied pose
    pub fn tick(&mut self, dt: Duration) -> PoseTransform {
        let Some(target) = self.blended_target() else {
            return self.current;
        };

        let smooth_time = self.config.smooth_time.as_secs_f32();
        let dt = dt.as_secs_f32();

        self.current.position = smooth_damp(
            self.current.position,
            target.position,
            &mut self.velocity,
            smooth_time,
            dt,
        );
        self.current.rotation = smooth_rotation(
            self.current.rotation,
            target.rotation,
            smooth_time,
            dt,
            self.config.rotation_catch_up,
        );

        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poselink_core::Rotation3D;

    const FRAME: Duration = Duration::from_millis(16);

    fn received(x: f32, z: f32, yaw: f32) -> Pose {
        let mut pose = Pose::default();
        pose.head = PoseTransform::new(Position3D::new(x, 1.7, z), Rotation3D::from_yaw(yaw));
        pose
    }

    fn tracking(blend: f32) -> PoseReconstructor {
        PoseReconstructor::new(
            PoseTransform::default(),
            ReconstructorConfig {
                blend_ratio: blend,
                ..ReconstructorConfig::default()
            },
        )
    }

    fn run(r: &mut PoseReconstructor, total: Duration, step: Duration) {
        let mut t = Duration::ZERO;
        while t < total {
            r.tick(step);
            t += step;
        }
    }

    #[test]
    fn test_idle_until_first_pose() {
        let mut r = tracking(1.0);
        assert_eq!(r.state(), ReconstructorState::Idle);

        let before = *r.current();
        r.tick(FRAME);
        assert_eq!(*r.current(), before);

        r.on_decoded_pose(&received(1.0, 1.0, 0.0));
        assert_eq!(r.state(), ReconstructorState::Tracking);
    }

    #[test]
    fn test_receive_convention() {
        let mut pose = received(0.5, 2.0, 0.7);
        let pitch = Rotation3D::from_axis_angle(Position3D::new(1.0, 0.0, 0.0), 0.4);
        pose.head.rotation = pose.head.rotation * pitch;

        let t = receive_transform(&pose);

        assert_eq!(t.position, Position3D::new(-0.5, 0.0, 2.0));
        assert!(t.rotation.x.abs() < 1e-6 && t.rotation.z.abs() < 1e-6);
        assert!((t.rotation.yaw() - 0.7).abs() < 1e-4);
    }

    #[test]
    fn test_converges_with_full_blend() {
        let mut r = tracking(1.0);
        r.on_decoded_pose(&received(-1.0, 2.0, 1.0));
        let target = *r.latest_received().unwrap();
        let initial = r.current().position.distance(&target.position);

        let d = r.smooth_time() * 5;
        run(&mut r, d, FRAME);

        assert!(r.current().position.distance(&target.position) <= initial * 0.01);
        assert!(r.current().rotation.angle_to(&target.rotation) < 0.01);
    }

    #[test]
    fn test_zero_blend_stays_at_default() {
        let default = PoseTransform::new(Position3D::new(0.2, 0.0, 0.4), Rotation3D::from_yaw(0.3));
        let mut r = PoseReconstructor::new(default, ReconstructorConfig::default());
        r.on_decoded_pose(&received(3.0, -3.0, 2.0));

        run(&mut r, Duration::from_secs(2), FRAME);

        assert!(r.current().position.distance(&default.position) < 1e-4);
        assert!(r.current().rotation.angle_to(&default.rotation) < 1e-3);
    }

    #[test]
    fn test_half_blend_targets_midpoint() {
        let mut r = tracking(0.5);
        r.on_decoded_pose(&received(-2.0, 4.0, 0.0));

        run(&mut r, Duration::from_secs(2), FRAME);

        let p = r.current().position;
        assert!((p.x - 1.0).abs() < 1e-3);
        assert!((p.z - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_smooth_time_snaps() {
        let mut r = tracking(1.0);
        r.set_smooth_time(Duration::ZERO);
        r.on_decoded_pose(&received(1.0, 1.0, 1.2));

        r.tick(FRAME);

        assert_eq!(r.current().position, Position3D::new(-1.0, 0.0, 1.0));
        assert!(r.current().rotation.angle_to(&Rotation3D::from_yaw(1.2)) < 1e-3);
    }

    #[test]
    fn test_frame_rate_independence() {
        let mut slow = tracking(1.0);
        let mut fast = tracking(1.0);
        let pose = received(-1.0, 2.0, 0.0);
        slow.on_decoded_pose(&pose);
        fast.on_decoded_pose(&pose);

        let total = Duration::from_millis(96);
        run(&mut slow, total, Duration::from_millis(32));
        run(&mut fast, total, Duration::from_millis(8));

        let gap = slow.current().position.distance(&fast.current().position);
        assert!(gap < 0.05, "gap {gap}");
    }

    #[test]
    fn test_blend_change_is_continuous() {
        let mut r = tracking(0.0);
        r.on_decoded_pose(&received(-2.0, 0.0, 0.0));
        run(&mut r, Duration::from_secs(1), FRAME);

        let before = r.current().position;
        r.set_blend_ratio(1.0);
        let after = r.tick(FRAME).position;

        // One frame covers only a small part of the 2 m jump in target
        assert!(before.distance(&after) < 0.2);
        assert!(after.x > before.x);
    }

    #[test]
    fn test_rotation_leads_position() {
        let mut r = tracking(1.0);
        r.on_decoded_pose(&received(-1.0, 0.0, 1.5));
        let target = *r.latest_received().unwrap();

        let d = r.smooth_time();
        run(&mut r, d, FRAME);

        let pos_left = r.current().position.distance(&target.position) / target.position.length();
        let rot_left = r.current().rotation.angle_to(&target.rotation) / 1.5;
        assert!(rot_left < pos_left);
    }

    #[test]
    fn test_malformed_message_is_dropped() {
        let mut r = tracking(1.0);

        assert!(r.on_message("1#2%nope").is_err());
        assert_eq!(r.state(), ReconstructorState::Idle);
        assert_eq!(r.dropped_messages(), 1);

        r.on_message("1#2#3%0#0#0#1").unwrap();
        assert_eq!(r.received_count(), 1);
        assert_eq!(r.latest_received().unwrap().position, Position3D::new(-1.0, 0.0, 3.0));
    }

    #[test]
    fn test_blend_ratio_is_clamped() {
        let mut r = tracking(0.0);
        r.set_blend_ratio(4.0);
        assert_eq!(r.blend_ratio(), 1.0);
        r.set_blend_ratio(-1.0);
        assert_eq!(r.blend_ratio(), 0.0);
    }
}
