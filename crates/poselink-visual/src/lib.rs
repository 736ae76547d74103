//! PoseLink Visual - remote participant proxy
//!
//! Network poses arrive at packet rate and with jitter. The proxy should
//! move at render rate and never jump.
//!
//! # Pipeline
//!
//! decoded pose → protocol transform (mirror X, flatten Y, yaw only)
//! → blend with rest pose → smooth toward blended target every tick
//!
//! The blend ratio itself is not smoothed; the filter state carries over, so
//! changing it abruptly still yields continuous motion.

pub mod reconstructor;
pub mod smoothing;

pub use reconstructor::*;
pub use smoothing::*;
