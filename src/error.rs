//! Error types
//!
//! Transport failures are surfaced as events on the shared channel, not as
//! errors; the error types here cover the cases a caller can actually act on
//! (bad endpoint, released handle, ack timeout).

use std::time::Duration;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Clone)]
pub enum Error {
    /// Channel-level error
    Channel(ChannelError),
    /// An acknowledged emit did not receive its ack in time
    AckTimeout {
        /// Event that was emitted
        event: String,
        /// How long we waited
        after: Duration,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Channel(e) => write!(f, "Channel error: {}", e),
            Error::AckTimeout { event, after } => {
                write!(f, "No ack for '{}' after {:?}", event, after)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Channel(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Error::Channel(e)
    }
}

/// Error type for shared-channel operations
#[derive(Debug, Clone)]
pub enum ChannelError {
    /// The endpoint could not be resolved to a channel URL
    InvalidEndpoint(String),
    /// A relative endpoint was given without a configured base
    MissingBase(String),
    /// The handle was already released
    Released,
    /// The underlying connection actor is gone (pool disposed or connection
    /// closed permanently)
    Closed,
    /// The connection was lost while an operation was in flight
    ConnectionLost,
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::InvalidEndpoint(e) => write!(f, "Invalid endpoint: {}", e),
            ChannelError::MissingBase(e) => {
                write!(f, "Relative endpoint '{}' requires a base", e)
            }
            ChannelError::Released => write!(f, "Handle already released"),
            ChannelError::Closed => write!(f, "Channel closed"),
            ChannelError::ConnectionLost => write!(f, "Connection lost"),
        }
    }
}

impl std::error::Error for ChannelError {}
