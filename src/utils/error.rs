//! Error types returned by the connection, registry and fan-out layers.
//!
//! None of these are fatal to the server. `InvalidArgument` is always the
//! caller's fault, `NotFound` reports a registry miss, the closed variants
//! report work against a torn-down connection, and `Io`/`Timeout` isolate a
//! single broken link so the caller can evict it.

use std::time::Duration;

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was empty or otherwise unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The registry has no record of the requested identity or connection.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write attempted on a connection that is closing or closed.
    #[error("connection is closed, can't be written")]
    ConnectionClosed,

    /// `close` called on a connection that was already closed.
    #[error("connection already closed")]
    AlreadyClosed,

    /// The underlying WebSocket stream failed.
    #[error("stream error: {0}")]
    Io(#[from] tungstenite::Error),

    /// A write did not complete within the configured bound.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    #[inline]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    #[inline]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// True for failures caused by the connection being gone, which callers
    /// treat as a no-op rather than a fault.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::AlreadyClosed)
    }
}
