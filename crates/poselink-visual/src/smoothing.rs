//! Critically damped smoothing

use poselink_core::{Position3D, Rotation3D};

/// Move `current` toward `target` with a critically damped spring.
///
/// `velocity` is filter state owned by the caller and must persist between
/// calls. `smooth_time` is roughly the time to reach the target; zero or
/// negative snaps. The step is stable for any `dt` and never overshoots.
pub fn smooth_damp(
    current: Position3D,
    target: Position3D,
    velocity: &mut Position3D,
    smooth_time: f32,
    dt: f32,
) -> Position3D {
    if smooth_time <= 0.0 {
        *velocity = Position3D::zero();
        return target;
    }
    if dt <= 0.0 {
        return current;
    }

    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    // Pade approximation of exp(-x)
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + change * omega) * dt;
    *velocity = (*velocity - temp * omega) * decay;

    let output = target + (change + temp) * decay;

    // Crossed the target: clamp
    if (target - current).dot(&(output - target)) > 0.0 {
        *velocity = Position3D::zero();
        return target;
    }

    output
}

/// Interpolation factor for one rotation step.
///
/// Scales with `dt / smooth_time` and is multiplied by `catch_up`, so
/// rotation converges faster than position. Zero smoothing snaps.
pub fn rotation_step(smooth_time: f32, dt: f32, catch_up: f32) -> f32 {
    if smooth_time <= 0.0 {
        return 1.0;
    }
    (dt / smooth_time * catch_up).clamp(0.0, 1.0)
}

/// Advance `current` toward `target` by one rotation step
pub fn smooth_rotation(
    current: Rotation3D,
    target: Rotation3D,
    smooth_time: f32,
    dt: f32,
    catch_up: f32,
) -> Rotation3D {
    current
        .slerp(&target, rotation_step(smooth_time, dt, catch_up))
        .normalize()
}
