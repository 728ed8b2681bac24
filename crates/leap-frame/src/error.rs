use std::io::{self, ErrorKind};

/// Errors that can occur while reading or writing `length:payload` frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The length header is not a run of ASCII digits terminated by `:`
    /// within the configured header bound.
    #[error("bad frame header {header:?}: {reason}")]
    BadHeader { header: String, reason: &'static str },

    /// The declared (or outgoing) payload length is larger than allowed.
    #[error("bad frame length {length} (max {max})")]
    BadLength { length: String, max: usize },

    /// The remote end closed the stream, or a write hit a broken pipe.
    #[error("peer shut down: {0}")]
    PeerShutdown(String),

    /// Any other I/O error while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(io::Error),
}

impl FrameError {
    /// True for malformed-header and bad-length errors. The stream can no
    /// longer be trusted to be frame aligned after one of these.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::BadHeader { .. } | Self::BadLength { .. })
    }

    pub fn is_peer_shutdown(&self) -> bool {
        matches!(self, Self::PeerShutdown(_))
    }

    pub(crate) fn bad_header(header: &[u8], reason: &'static str) -> Self {
        Self::BadHeader {
            header: String::from_utf8_lossy(header).into_owned(),
            reason,
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            // EPIPE / EINVAL (invalid handle) are how a vanished host shows up.
            ErrorKind::BrokenPipe
            | ErrorKind::InvalidInput
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof
            | ErrorKind::WriteZero => FrameError::PeerShutdown(err.to_string()),
            _ => FrameError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
