//! Synthetic pose trajectories

use std::f32::consts::{FRAC_PI_2, TAU};
use std::time::Duration;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

use poselink_core::{Pose, PoseTransform, Position3D, Rotation3D};

/// Trajectory parameters
#[derive(Debug, Clone)]
pub struct TrajectoryConfig {
    /// Radius of the walked circle in meters
    pub radius: f32,
    /// Head height
    pub height: f32,
    /// Time for one lap
    pub period: Duration,
    /// Hand offset from the head, sideways
    pub hand_span: f32,
    /// Uniform positional noise amplitude
    pub jitter: f32,
    pub seed: u64,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            radius: 1.5,
            height: 1.6,
            period: Duration::from_secs(8),
            hand_span: 0.3,
            jitter: 0.005,
            seed: 42,
        }
    }
}

/// A participant walking a circle, facing along the path
pub struct Trajectory {
    config: TrajectoryConfig,
    rng: StdRng,
    noise: Option<Uniform<f32>>,
}

impl Trajectory {
    pub fn new(config: TrajectoryConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let noise = (config.jitter > 0.0).then(|| Uniform::new_inclusive(-config.jitter, config.jitter));
        Self { config, rng, noise }
    }

    pub fn config(&self) -> &TrajectoryConfig {
        &self.config
    }

    /// Pose at time `t` since the start of the walk
    pub fn sample(&mut self, t: Duration) -> Pose {
        let period = self.config.period.as_secs_f32().max(f32::EPSILON);
        let phase = TAU * t.as_secs_f32() / period;

        let center = Position3D::new(
            self.config.radius * phase.sin(),
            self.config.height,
            self.config.radius * phase.cos(),
        ) + self.jitter();
        // Tangent of the circle; yaw 0 faces +Z
        let heading = Rotation3D::from_yaw(phase + FRAC_PI_2);

        let right = heading.rotate(Position3D::new(self.config.hand_span, -0.4, 0.2));
        let left = heading.rotate(Position3D::new(-self.config.hand_span, -0.4, 0.2));

        Pose::new(
            PoseTransform::new(center, heading),
            PoseTransform::new(center + left + self.jitter(), heading),
            PoseTransform::new(center + right + self.jitter(), heading),
        )
    }

    fn jitter(&mut self) -> Position3D {
        match self.noise.as_ref() {
            Some(noise) => Position3D::new(
                noise.sample(&mut self.rng),
                noise.sample(&mut self.rng),
                noise.sample(&mut self.rng),
            ),
            None => Position3D::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_path() {
        let mut a = Trajectory::new(TrajectoryConfig::default());
        let mut b = Trajectory::new(TrajectoryConfig::default());

        for ms in [0u64, 100, 2_500] {
            let t = Duration::from_millis(ms);
            assert_eq!(a.sample(t), b.sample(t));
        }
    }

    #[test]
    fn test_stays_on_circle_without_jitter() {
        let mut path = Trajectory::new(TrajectoryConfig {
            jitter: 0.0,
            ..TrajectoryConfig::default()
        });

        for ms in (0..8_000).step_by(500) {
            let head = path.sample(Duration::from_millis(ms)).head.position;
            let r = (head.x * head.x + head.z * head.z).sqrt();
            assert!((r - 1.5).abs() < 1e-4);
            assert!((head.y - 1.6).abs() < 1e-6);
        }
    }

    #[test]
    fn test_hands_are_beside_head() {
        let mut path = Trajectory::new(TrajectoryConfig {
            jitter: 0.0,
            ..TrajectoryConfig::default()
        });
        let pose = path.sample(Duration::from_secs(1));

        let span = pose.left_hand.position.distance(&pose.right_hand.position);
        assert!((span - 0.6).abs() < 1e-4);
        assert!(pose.is_finite());
    }
}
