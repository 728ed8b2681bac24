//! `tokio_util::codec` adapter for the `length:payload` format.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reader::eof_error;

/// Frame codec for `FramedRead` / `FramedWrite`.
///
/// A stream that ends cleanly between frames yields `None`; one that ends
/// inside a frame yields [`FrameError::PeerShutdown`].
#[derive(Debug, Clone, Default)]
pub struct LeapCodec {
    config: FrameConfig,
}

impl LeapCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for LeapCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        decode_frame(src, &self.config)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        match self.decode(src)? {
            Some(payload) => Ok(Some(payload)),
            None if src.is_empty() => Ok(None),
            None => Err(eof_error(src.len())),
        }
    }
}

impl Encoder<Bytes> for LeapCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        <Self as Encoder<&[u8]>>::encode(self, item.as_ref(), dst)
    }
}

impl Encoder<&[u8]> for LeapCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.config.max_payload_size {
            return Err(FrameError::BadLength {
                length: item.len().to_string(),
                max: self.config.max_payload_size,
            });
        }
        encode_frame(item, dst);
        Ok(())
    }
}
