use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Separates the decimal length header from the payload.
pub const DELIMITER: u8 = b':';

/// Maximum number of header digits accepted before the delimiter.
pub const DEFAULT_MAX_HEADER_LEN: usize = 20;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Configuration shared by the blocking and async frame codecs.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Header digits allowed before `:` must appear. Default: 20.
    pub max_header_len: usize,
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_header_len: DEFAULT_MAX_HEADER_LEN,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// <decimal byte count of payload>:<payload bytes>
/// ```
///
/// There is no terminator and no checksum. The payload may contain any byte,
/// including `:` and newlines.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    let header = payload.len().to_string();
    dst.reserve(header.len() + 1 + payload.len());
    dst.put_slice(header.as_bytes());
    dst.put_u8(DELIMITER);
    dst.put_slice(payload);
}

/// Decode one frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer and returns the
/// payload with the header stripped.
pub fn decode_frame(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Bytes>> {
    let Some(header_len) = scan_header(src, config.max_header_len)? else {
        return Ok(None);
    };

    let header = &src[..header_len];
    let length = parse_length(header, config.max_payload_size)?;

    let total = header_len + 1 + length;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(header_len + 1);
    Ok(Some(src.split_to(length).freeze()))
}

/// Locate the delimiter, validating header bytes along the way.
///
/// Returns the number of header bytes preceding the delimiter.
fn scan_header(src: &[u8], max_header_len: usize) -> Result<Option<usize>> {
    let window = src.len().min(max_header_len + 1);
    for (idx, &byte) in src[..window].iter().enumerate() {
        if byte == DELIMITER {
            if idx == 0 {
                return Err(FrameError::bad_header(&src[..0], "empty length"));
            }
            return Ok(Some(idx));
        }
        if !byte.is_ascii_digit() {
            return Err(FrameError::bad_header(&src[..=idx], "non-numeric length"));
        }
    }

    if src.len() > max_header_len {
        return Err(FrameError::bad_header(
            &src[..max_header_len],
            "expected length:data, no delimiter within header bound",
        ));
    }
    Ok(None)
}

fn parse_length(header: &[u8], max_payload_size: usize) -> Result<usize> {
    let text = std::str::from_utf8(header)
        .map_err(|_| FrameError::bad_header(header, "non-numeric length"))?;
    let too_large = || FrameError::BadLength {
        length: text.to_string(),
        max: max_payload_size,
    };
    let length: usize = text.parse().map_err(|_| too_large())?;
    if length > max_payload_size {
        return Err(too_large());
    }
    Ok(length)
}
