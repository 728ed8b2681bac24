use leap_frame::FrameError;
use leap_llsd::ParseError;

/// Errors that can occur in plugin session and event-loop operations.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Frame-level error, including host shutdown.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A frame payload was not valid LLSD notation.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A decoded payload is not a `{pump, data}` map.
    #[error("malformed envelope: {0}")]
    Envelope(String),

    /// The startup message or the listen acknowledgement was unusable.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The session has not been established yet.
    #[error("session not established")]
    NotConnected,

    /// The event loop is stopped (or was never started).
    #[error("plugin is not running")]
    NotRunning,
}

impl PluginError {
    /// The host closed stdin or stopped accepting our stdout.
    pub fn is_peer_shutdown(&self) -> bool {
        matches!(self, Self::Frame(err) if err.is_peer_shutdown())
    }

    /// Errors after which the inbound stream can no longer be trusted.
    pub fn is_stream_fatal(&self) -> bool {
        matches!(self, Self::Frame(_) | Self::Parse(_))
    }
}

/// A registered handler reported failure.
///
/// Contained by the dispatcher: logged with the command name, never
/// propagated out of the event loop.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<PluginError> for HandlerError {
    fn from(err: PluginError) -> Self {
        Self(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;
pub type HandlerResult = std::result::Result<(), HandlerError>;
