//! Error types for PoseLink

use std::path::PathBuf;

use thiserror::Error;

/// Core PoseLink errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoseLinkError {
    // Config errors
    #[error("Config file {path:?} unreadable: {reason}")]
    ConfigIo { path: PathBuf, reason: String },

    #[error("Config line {line}: {reason}")]
    ConfigParse { line: usize, reason: String },

    // Wire errors
    #[error("Malformed pose message: {0}")]
    Decode(String),

    #[error("Invalid OSC packet: {0}")]
    InvalidOsc(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    // Transport errors
    #[error("Cannot bind transport: {0}")]
    TransportBind(String),

    #[error("Transport error: {0}")]
    TransportError(String),
}

impl PoseLinkError {
    /// Whether the error concerns a single inbound message (drop it and move on)
    pub fn is_message_error(&self) -> bool {
        matches!(
            self,
            PoseLinkError::Decode(_)
                | PoseLinkError::InvalidOsc(_)
                | PoseLinkError::BufferTooShort { .. }
        )
    }
}

/// Result type for PoseLink operations
pub type PoseLinkResult<T> = Result<T, PoseLinkError>;
