//! Pose primitives - tracked points as position + orientation
//!
//! Coordinates follow the tracking device: Y is up, rotations are unit
//! quaternions. A [`Pose`] is a plain value copied through the pipeline.

use std::ops::{Add, Mul, Neg, Sub};

use serde::Serialize;

/// Tracked point identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TrackedPoint {
    Head,
    LeftHand,
    RightHand,
}

impl TrackedPoint {
    /// All tracked points in wire order
    pub fn all() -> &'static [TrackedPoint] {
        &[
            TrackedPoint::Head,
            TrackedPoint::LeftHand,
            TrackedPoint::RightHand,
        ]
    }

    /// Number of tracked points
    pub fn count() -> usize {
        3
    }
}

/// 3D position in meters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Linear interpolation
    pub fn lerp(&self, other: &Position3D, t: f32) -> Position3D {
        Position3D {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    /// Distance to another position
    pub fn distance(&self, other: &Position3D) -> f32 {
        (*self - *other).length()
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn dot(&self, other: &Position3D) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Position3D) -> Position3D {
        Position3D {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Position3D {
    type Output = Position3D;

    fn add(self, rhs: Position3D) -> Position3D {
        Position3D::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Position3D {
    type Output = Position3D;

    fn sub(self, rhs: Position3D) -> Position3D {
        Position3D::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Position3D {
    type Output = Position3D;

    fn mul(self, rhs: f32) -> Position3D {
        Position3D::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Position3D {
    type Output = Position3D;

    fn neg(self) -> Position3D {
        Position3D::new(-self.x, -self.y, -self.z)
    }
}

/// Orientation as a unit quaternion
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rotation3D {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Rotation3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Rotation3D {
    pub fn identity() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Build from components in wire order (x, y, z, w)
    pub fn from_xyzw(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `yaw` radians about the vertical (Y) axis
    pub fn from_yaw(yaw: f32) -> Self {
        let half = yaw * 0.5;
        Self {
            w: half.cos(),
            x: 0.0,
            y: half.sin(),
            z: 0.0,
        }
    }

    /// Rotation of `angle` radians about a unit `axis`
    pub fn from_axis_angle(axis: Position3D, angle: f32) -> Self {
        let half = angle * 0.5;
        let s = half.sin();
        Self {
            w: half.cos(),
            x: axis.x * s,
            y: axis.y * s,
            z: axis.z * s,
        }
    }

    /// Heading about the vertical axis, in radians.
    ///
    /// Matches the Y component of a Z-X-Y Euler decomposition, so pitch and
    /// roll do not leak into the result.
    pub fn yaw(&self) -> f32 {
        let siny = 2.0 * (self.w * self.y + self.x * self.z);
        let cosy = 1.0 - 2.0 * (self.x * self.x + self.y * self.y);
        siny.atan2(cosy)
    }

    /// Drop pitch and roll, keeping only the heading
    pub fn yaw_only(&self) -> Rotation3D {
        Rotation3D::from_yaw(self.yaw())
    }

    pub fn dot(&self, other: &Rotation3D) -> f32 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Angle between two orientations, in radians
    pub fn angle_to(&self, other: &Rotation3D) -> f32 {
        let dot = self.dot(other).abs().min(1.0);
        2.0 * dot.acos()
    }

    /// Inverse of a unit quaternion
    pub fn conjugate(&self) -> Rotation3D {
        Rotation3D {
            w: self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    /// Rotate a vector by this orientation
    pub fn rotate(&self, v: Position3D) -> Position3D {
        let q = Position3D::new(self.x, self.y, self.z);
        let t = q.cross(&v) * 2.0;
        v + t * self.w + q.cross(&t)
    }

    /// Spherical linear interpolation
    pub fn slerp(&self, other: &Rotation3D, t: f32) -> Rotation3D {
        let mut dot = self.dot(other);

        let other = if dot < 0.0 {
            dot = -dot;
            Rotation3D {
                w: -other.w,
                x: -other.x,
                y: -other.y,
                z: -other.z,
            }
        } else {
            *other
        };

        if dot > 0.9995 {
            // Linear interpolation for very close quaternions
            let result = Rotation3D {
                w: self.w + (other.w - self.w) * t,
                x: self.x + (other.x - self.x) * t,
                y: self.y + (other.y - self.y) * t,
                z: self.z + (other.z - self.z) * t,
            };
            return result.normalize();
        }

        let theta_0 = dot.acos();
        let theta = theta_0 * t;
        let sin_theta = theta.sin();
        let sin_theta_0 = theta_0.sin();

        let s0 = theta.cos() - dot * sin_theta / sin_theta_0;
        let s1 = sin_theta / sin_theta_0;

        Rotation3D {
            w: self.w * s0 + other.w * s1,
            x: self.x * s0 + other.x * s1,
            y: self.y * s0 + other.y * s1,
            z: self.z * s0 + other.z * s1,
        }
    }

    pub fn normalize(&self) -> Rotation3D {
        let len = self.dot(self).sqrt();
        if len < 0.0001 {
            return Rotation3D::identity();
        }
        Rotation3D {
            w: self.w / len,
            x: self.x / len,
            y: self.y / len,
            z: self.z / len,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.w.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Mul for Rotation3D {
    type Output = Rotation3D;

    /// Hamilton product: `self` applied after `rhs`
    fn mul(self, rhs: Rotation3D) -> Rotation3D {
        Rotation3D {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }
}

/// Position + orientation of a single tracked point
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PoseTransform {
    pub position: Position3D,
    pub rotation: Rotation3D,
}

impl PoseTransform {
    pub fn new(position: Position3D, rotation: Rotation3D) -> Self {
        Self { position, rotation }
    }

    /// Interpolate position linearly and rotation spherically
    pub fn lerp(&self, other: &PoseTransform, t: f32) -> PoseTransform {
        PoseTransform {
            position: self.position.lerp(&other.position, t),
            rotation: self.rotation.slerp(&other.rotation, t),
        }
    }
}

/// Snapshot of head and both hands
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pose {
    pub head: PoseTransform,
    pub left_hand: PoseTransform,
    pub right_hand: PoseTransform,
}

impl Pose {
    pub fn new(head: PoseTransform, left_hand: PoseTransform, right_hand: PoseTransform) -> Self {
        Self {
            head,
            left_hand,
            right_hand,
        }
    }

    /// Get a tracked point
    pub fn point(&self, point: TrackedPoint) -> &PoseTransform {
        match point {
            TrackedPoint::Head => &self.head,
            TrackedPoint::LeftHand => &self.left_hand,
            TrackedPoint::RightHand => &self.right_hand,
        }
    }

    /// Get a tracked point mutably
    pub fn point_mut(&mut self, point: TrackedPoint) -> &mut PoseTransform {
        match point {
            TrackedPoint::Head => &mut self.head,
            TrackedPoint::LeftHand => &mut self.left_hand,
            TrackedPoint::RightHand => &mut self.right_hand,
        }
    }

    /// True when every component is a finite number
    pub fn is_finite(&self) -> bool {
        TrackedPoint::all().iter().all(|p| {
            let t = self.point(*p);
            t.position.is_finite() && t.rotation.is_finite()
        })
    }
}

/// Frame that tracked world poses are expressed relative to.
///
/// Positions are moved into the frame and multiplied by `scale`; rotations
/// are pre-multiplied by the inverse frame rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    pub origin: Position3D,
    pub rotation: Rotation3D,
    pub scale: f32,
}

impl Default for ReferenceFrame {
    fn default() -> Self {
        Self {
            origin: Position3D::zero(),
            rotation: Rotation3D::identity(),
            scale: 2.0,
        }
    }
}

impl ReferenceFrame {
    pub fn new(origin: Position3D, rotation: Rotation3D) -> Self {
        Self {
            origin,
            rotation,
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn to_local_point(&self, world: Position3D) -> Position3D {
        self.rotation.conjugate().rotate(world - self.origin) * self.scale
    }

    pub fn to_local_rotation(&self, world: Rotation3D) -> Rotation3D {
        self.rotation.conjugate() * world
    }

    pub fn to_local(&self, world: &PoseTransform) -> PoseTransform {
        PoseTransform {
            position: self.to_local_point(world.position),
            rotation: self.to_local_rotation(world.rotation),
        }
    }

    /// Express a whole world-space pose in this frame
    pub fn to_local_pose(&self, world: &Pose) -> Pose {
        Pose {
            head: self.to_local(&world.head),
            left_hand: self.to_local(&world.left_hand),
            right_hand: self.to_local(&world.right_hand),
        }
    }
}
