//! PoseLink Transport Layer - fire-and-forget UDP
//!
//! This crate provides:
//! - A connected OSC sender bound to one target
//! - One-shot broadcasts over transient sockets
//! - A receive loop that parses OSC datagrams
//! - Local IPv4 discovery for self-announcement

pub mod broadcast;
pub mod udp;

pub use broadcast::*;
pub use udp::*;
