use std::fmt;
use std::io;

use leap_frame::FrameError;
use leap_llsd::ParseError;
use leap_plugin::PluginError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(FAILURE, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::BadHeader { .. } | FrameError::BadLength { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::PeerShutdown(_) => CliError::new(SUCCESS, format!("{context}: {err}")),
    }
}

pub fn parse_error(context: &str, err: ParseError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn plugin_error(context: &str, err: PluginError) -> CliError {
    match err {
        PluginError::Frame(err) => frame_error(context, err),
        PluginError::Parse(err) => parse_error(context, err),
        PluginError::Envelope(_) | PluginError::Handshake(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        PluginError::NotConnected | PluginError::NotRunning => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}
