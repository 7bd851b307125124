//! Error types for the replicated sequence and its delivery layer.

use thiserror::Error;

use crate::crdt::types::Timestamp;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while editing, delivering or transporting operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A local edit addressed a position outside the visible sequence.
    #[error("position {position} out of range for sequence of length {length}")]
    PositionOutOfRange { position: usize, length: usize },

    /// An operation referenced a node this replica has never seen.
    #[error("unknown timestamp {0}")]
    UnknownTimestamp(Timestamp),

    /// A remove operation targeted the virtual root.
    #[error("the root node cannot be removed")]
    RootRemoval,

    /// A message could not be decoded, including unknown operation tags.
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    /// A relay frame arrived that makes no sense in the current state.
    #[error("unexpected frame: {0}")]
    UnexpectedFrame(String),

    /// The transport could not hand a message over.
    #[error("transport error: {0}")]
    Transport(String),

    /// The other end of an internal channel has gone away.
    #[error("channel closed")]
    ChannelClosed,

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Caller bugs: nothing was mutated and the session may continue.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::PositionOutOfRange { .. })
    }

    /// Transport or serialization bugs that make the connection unusable.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::UnknownTimestamp(_)
                | Error::RootRemoval
                | Error::Decode(_)
                | Error::UnexpectedFrame(_)
        )
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::ChannelClosed
    }
}
