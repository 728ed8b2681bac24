use std::io::Write;

use bytes::BytesMut;

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};

/// Blocking counterpart of the `LeapCodec` encoder.
///
/// Each frame is encoded into one buffer and handed to the stream with a
/// single `write_all` and a flush, so frames from one writer never
/// interleave.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            config,
        }
    }

    /// Frame `payload`, write it out and flush.
    ///
    /// A host that has gone away (broken pipe, invalid handle, a stream
    /// accepting zero bytes) surfaces as [`FrameError::PeerShutdown`].
    pub fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::BadLength {
                length: payload.len().to_string(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(payload, &mut self.buf);
        self.inner.write_all(&self.buf)?;
        self.inner.flush()?;
        tracing::trace!(len = payload.len(), "frame sent");
        Ok(())
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, ErrorKind};

    use super::*;
    use crate::reader::FrameReader;

    /// A pipe end whose behaviour is scripted per call.
    #[derive(Default)]
    struct Pipe {
        wire: Vec<u8>,
        chunk: Option<usize>,
        interrupt_first: bool,
        fail: Option<ErrorKind>,
        flushes: usize,
    }

    impl Write for Pipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.fail {
                return Err(kind.into());
            }
            if std::mem::take(&mut self.interrupt_first) {
                return Err(ErrorKind::Interrupted.into());
            }
            let n = self.chunk.map_or(buf.len(), |c| c.min(buf.len()));
            self.wire.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    fn pipe_error(kind: ErrorKind) -> FrameError {
        let mut writer = FrameWriter::new(Pipe {
            fail: Some(kind),
            ..Pipe::default()
        });
        writer.write_frame(b"{}").unwrap_err()
    }

    #[test]
    fn startup_frame_bytes() {
        let payload = b"{'data':{'command':'18ce5015-b651-1d2e-2470-0de841fd3635','features':{}},'pump':'54481a53-c41f-4fc2-606e-516daed03636'}";
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_frame(payload).unwrap();

        let wire = writer.into_inner();
        assert!(wire.starts_with(b"119:{'data'"));
        assert_eq!(wire.len(), 4 + payload.len());
    }

    #[test]
    fn frames_read_back_in_order() {
        let mut writer = FrameWriter::new(Vec::new());
        for payload in [&b"i1"[..], b"'a:b\nc'", b""] {
            writer.write_frame(payload).unwrap();
        }
        let wire = writer.into_inner();
        assert_eq!(wire, b"2:i17:'a:b\nc'0:");

        let mut reader = FrameReader::new(Cursor::new(wire));
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"i1");
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"'a:b\nc'");
        assert!(reader.read_frame().unwrap().is_empty());
    }

    #[test]
    fn oversized_payload_writes_nothing() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Pipe::default(), cfg);

        let err = writer.write_frame(b"'too long'").unwrap_err();
        assert!(matches!(err, FrameError::BadLength { max: 4, .. }));
        assert!(writer.get_ref().wire.is_empty());
        assert_eq!(writer.get_ref().flushes, 0);
    }

    #[test]
    fn short_and_interrupted_writes_complete_then_flush() {
        let mut writer = FrameWriter::new(Pipe {
            chunk: Some(3),
            interrupt_first: true,
            ..Pipe::default()
        });
        writer.write_frame(b"{'x':i1}").unwrap();

        let pipe = writer.into_inner();
        assert_eq!(pipe.wire, b"8:{'x':i1}");
        assert_eq!(pipe.flushes, 1);
    }

    #[test]
    fn vanished_host_is_peer_shutdown() {
        assert!(pipe_error(ErrorKind::BrokenPipe).is_peer_shutdown());
        assert!(pipe_error(ErrorKind::InvalidInput).is_peer_shutdown());

        let mut writer = FrameWriter::new(Pipe {
            chunk: Some(0),
            ..Pipe::default()
        });
        assert!(writer.write_frame(b"{}").unwrap_err().is_peer_shutdown());
    }

    #[test]
    fn other_write_errors_stay_io() {
        let err = pipe_error(ErrorKind::PermissionDenied);
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::PermissionDenied));
    }
}
