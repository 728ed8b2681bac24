//! Length-prefixed framing for LEAP plugin stdio.
//!
//! Every message on the wire is `length:payload`:
//! - `length` is the ASCII decimal byte count of `payload`
//! - `:` is a single literal delimiter byte
//! - `payload` is exactly `length` raw bytes
//!
//! No partial reads, no buffer management in user code. Payload bytes are
//! never interpreted here; see `leap-llsd` for the notation they carry.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::LeapCodec;
pub use codec::{
    decode_frame, encode_frame, FrameConfig, DEFAULT_MAX_HEADER_LEN, DEFAULT_MAX_PAYLOAD,
    DELIMITER,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
