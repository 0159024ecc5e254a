//! Wire protocol errors.

use std::io;

use thiserror::Error;

/// Errors raised while talking to the debugged runtime.
#[derive(Debug, Error)]
pub enum WireError {
    /// The runtime endpoint could not be reached.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Writing a command to the connection failed.
    #[error("wire write failed: {0}")]
    Io(#[from] io::Error),

    /// A command could not be serialized.
    #[error("failed to encode command: {0}")]
    Encode(#[source] serde_json::Error),

    /// An inbound frame was not valid JSON.
    #[error("invalid wire frame: {0}")]
    Decode(#[source] serde_json::Error),

    /// An inbound frame was JSON but matched no known message shape.
    #[error("unclassifiable wire message: {0}")]
    Malformed(String),

    /// A reply arrived while no command was waiting for one.
    #[error("reply received with no pending command")]
    UnexpectedReply,

    /// The runtime closed the connection.
    #[error("runtime connection closed")]
    Disconnected,
}

impl WireError {
    /// Whether the error invalidates the connection rather than a single frame.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Io(_) | Self::Disconnected
        )
    }
}

pub type WireResult<T> = std::result::Result<T, WireError>;
