//! PoseLink Config - where telemetry goes and how often
//!
//! Resolution layers, lowest first:
//! - Compiled-in defaults
//! - An optional plain-text config file found on a per-platform search path
//!
//! Resolution never fails: unreadable files and bad lines fall back to the
//! layer below.

pub mod config;
pub mod parser;
pub mod resolver;

pub use config::*;
pub use parser::*;
pub use resolver::*;
