//! Pose text codec
//!
//! Body layout (every number with exactly four fractional digits):
//!
//! ```text
//! hx#hy#hz@lx#ly#lz@rx#ry#rz%hqx#hqy#hqz#hqw@lqx#lqy#lqz#lqw@rqx#rqy#rqz#rqw
//! ```
//!
//! Position block first, rotation block second. Both ends must agree on the
//! delimiters and the precision.

use std::fmt::Write;

use poselink_core::{
    Pose, PoseLinkError, PoseLinkResult, PoseTransform, Position3D, Rotation3D, TrackedPoint,
};

use crate::OscMessage;

/// Separates the numbers of one point
pub const COMPONENT_DELIMITER: char = '#';

/// Separates tracked points within a block
pub const POINT_DELIMITER: char = '@';

/// Separates the position block from the rotation block
pub const BLOCK_DELIMITER: char = '%';

/// Fractional digits of every encoded number
pub const FRACTION_DIGITS: usize = 4;

/// Stateless pose encoder/decoder
pub struct PoseCodec;

impl PoseCodec {
    /// Encode a pose body
    pub fn encode(pose: &Pose) -> String {
        let mut out = String::with_capacity(192);

        for (i, point) in TrackedPoint::all().iter().enumerate() {
            if i > 0 {
                out.push(POINT_DELIMITER);
            }
            let p = pose.point(*point).position;
            push_components(&mut out, &[p.x, p.y, p.z]);
        }

        out.push(BLOCK_DELIMITER);

        for (i, point) in TrackedPoint::all().iter().enumerate() {
            if i > 0 {
                out.push(POINT_DELIMITER);
            }
            let r = pose.point(*point).rotation;
            push_components(&mut out, &[r.x, r.y, r.z, r.w]);
        }

        out
    }

    /// Decode a pose body.
    ///
    /// The head point is mandatory. Hand points are decoded when present and
    /// default to origin/identity when the sender omitted them. Blocks past
    /// the second are ignored.
    pub fn decode(message: &str) -> PoseLinkResult<Pose> {
        let mut blocks = message.split(BLOCK_DELIMITER);
        let (positions, rotations) = match (blocks.next(), blocks.next()) {
            (Some(p), Some(r)) => (p, r),
            _ => {
                return Err(PoseLinkError::Decode(format!(
                    "expected position and rotation blocks separated by '{}'",
                    BLOCK_DELIMITER
                )))
            }
        };

        let positions: Vec<&str> = positions.split(POINT_DELIMITER).collect();
        let rotations: Vec<&str> = rotations.split(POINT_DELIMITER).collect();

        let mut pose = Pose::default();
        for (i, point) in TrackedPoint::all().iter().enumerate() {
            let mandatory = *point == TrackedPoint::Head;
            let position = positions.get(i).filter(|s| mandatory || !s.trim().is_empty());
            let rotation = rotations.get(i).filter(|s| mandatory || !s.trim().is_empty());

            let target = pose.point_mut(*point);
            if let Some(text) = position {
                let [x, y, z] = parse_components::<3>(text, *point)?;
                target.position = Position3D::new(x, y, z);
            }
            if let Some(text) = rotation {
                let [x, y, z, w] = parse_components::<4>(text, *point)?;
                target.rotation = Rotation3D::from_xyzw(x, y, z, w);
            }
        }

        Ok(pose)
    }

    /// Wrap an encoded pose in an OSC message on `topic`
    pub fn to_osc(topic: &str, pose: &Pose) -> PoseLinkResult<Vec<u8>> {
        OscMessage::with_string(topic, Self::encode(pose)).encode()
    }

    /// Decode the pose carried by an OSC message
    pub fn from_osc(message: &OscMessage) -> PoseLinkResult<Pose> {
        let body = message.first_string().ok_or_else(|| {
            PoseLinkError::Decode(format!("{} carries no string argument", message.address))
        })?;
        Self::decode(body)
    }
}

/// Head-only helper for receivers that ignore the hands
pub fn decode_head(message: &str) -> PoseLinkResult<PoseTransform> {
    PoseCodec::decode(message).map(|pose| pose.head)
}

fn push_components(out: &mut String, values: &[f32]) {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(COMPONENT_DELIMITER);
        }
        // Writing into a String cannot fail
        let _ = write!(out, "{:.*}", FRACTION_DIGITS, v);
    }
}

fn parse_components<const N: usize>(text: &str, point: TrackedPoint) -> PoseLinkResult<[f32; N]> {
    let mut values = [0.0f32; N];
    let mut tokens = text.split(COMPONENT_DELIMITER);

    for (i, slot) in values.iter_mut().enumerate() {
        let token = tokens.next().ok_or_else(|| {
            PoseLinkError::Decode(format!(
                "{:?}: expected {} components, got {}",
                point, N, i
            ))
        })?;
        let value: f32 = token.trim().parse().map_err(|_| {
            PoseLinkError::Decode(format!("{:?}: not a number: {:?}", point, token))
        })?;
        if !value.is_finite() {
            return Err(PoseLinkError::Decode(format!(
                "{:?}: non-finite component {:?}",
                point, token
            )));
        }
        *slot = value;
    }

    Ok(values)
}
