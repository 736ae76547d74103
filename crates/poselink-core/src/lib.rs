//! PoseLink Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every PoseLink crate:
//! - Pose snapshots (head + both hands, position and orientation)
//! - Reference frames for expressing tracked poses locally
//! - The monotonic frame clock driving smoothing
//! - The error taxonomy

pub mod clock;
pub mod error;
pub mod pose;

pub use clock::*;
pub use error::*;
pub use pose::*;
