//! PoseLink Wire Format
//!
//! Every datagram is a single OSC 1.0 message:
//! - Address pattern (topic), NUL-terminated and 4-byte aligned
//! - Type tag string
//! - Arguments; pose bodies travel as one string argument
//!
//! The pose body itself is a delimited text encoding (see [`PoseCodec`]).

pub mod codec;
pub mod osc;

pub use codec::*;
pub use osc::*;
