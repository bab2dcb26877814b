use thiserror::Error;

/// Errors raised while converting between timecode text and seconds.
#[derive(Debug, Error, PartialEq)]
pub enum TimecodeError {
    #[error("invalid timecode {0:?}, expected HH:MM:SS:FF")]
    Format(String),

    #[error("frame rate must be greater than zero")]
    ZeroFrameRate,
}

/// Errors surfaced by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport is not connected")]
    NotConnected,

    #[error("transport closed")]
    Closed,
}

/// Errors from a single correlated query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("response address {0} stayed busy past the wait ceiling")]
    BusyTimeout(String),

    #[error("no reply on {0} before the query timeout")]
    Timeout(String),

    #[error("reply handler for {0} was dropped before a reply arrived")]
    Cancelled(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A reply arrived but its payload did not have the expected shape.
#[derive(Debug, Error, PartialEq)]
#[error("malformed reply on {address}: {reason}")]
pub struct ParseError {
    pub address: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from live edits against a cue registry.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("no cue or cue list with uid {0}")]
    NotFound(String),

    #[error("uid {0} is already registered")]
    DuplicateUid(String),
}

/// Errors from bringing a console session up.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("not connected to {0} after the settle interval")]
    NotConnected(String),

    #[error("connection to {0} abandoned, no new address supplied")]
    Abandoned(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("session is already connected")]
    AlreadyConnected,

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors that abort a console's synchronization pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("console session is not ready, run the handshake first")]
    NotReady,
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to serialize config: {0}")]
    SerializeError(String),

    #[error("Config validation errors: {}", .0.join(", "))]
    ValidationError(Vec<String>),
}
