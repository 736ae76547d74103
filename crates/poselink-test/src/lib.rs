//! PoseLink Test Harness - loopback pipeline validation
//!
//! This crate provides:
//! - Seeded synthetic pose trajectories
//! - An end-to-end harness running session, UDP loopback, receiver and
//!   reconstructor in one process

pub mod pipeline;
pub mod trajectory;

pub use pipeline::*;
pub use trajectory::*;
