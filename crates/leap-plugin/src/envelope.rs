//! The `{pump, data}` map every LEAP message is wrapped in.

use futures_util::StreamExt;
use leap_frame::{FrameConfig, FrameError, LeapCodec};
use leap_llsd::{from_notation, to_notation, Map, Value};
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::error::{PluginError, Result};

/// A routed message: the pump it is addressed to (outbound) or came from
/// (inbound), and its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub pump: String,
    pub data: Value,
}

impl Envelope {
    pub fn new(pump: impl Into<String>, data: Value) -> Self {
        Self {
            pump: pump.into(),
            data,
        }
    }

    /// Validate a decoded payload as an envelope.
    pub fn from_value(value: Value) -> Result<Self> {
        let kind = value.type_name();
        let mut map = value
            .into_map()
            .ok_or_else(|| PluginError::Envelope(format!("expected a map, got {kind}")))?;
        let pump = match map.shift_remove("pump") {
            Some(Value::String(pump)) => pump,
            Some(other) => {
                return Err(PluginError::Envelope(format!(
                    "'pump' must be a string, got {}",
                    other.type_name()
                )))
            }
            None => return Err(PluginError::Envelope("missing 'pump'".to_string())),
        };
        let data = map
            .shift_remove("data")
            .ok_or_else(|| PluginError::Envelope("missing 'data'".to_string()))?;
        Ok(Self { pump, data })
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(2);
        map.insert("pump".to_string(), Value::String(self.pump.clone()));
        map.insert("data".to_string(), self.data.clone());
        Value::Map(map)
    }

    pub fn to_notation(&self) -> Vec<u8> {
        to_notation(&self.to_value())
    }

    /// `data.command`, when the payload is a command event.
    pub fn command(&self) -> Option<&str> {
        self.data.get("command").and_then(Value::as_str)
    }

    /// `data.reqid`, present on replies to our requests.
    pub fn reqid(&self) -> Option<i64> {
        self.data.get("reqid").and_then(Value::as_i64)
    }
}

/// Decode one frame payload into an envelope.
///
/// Parse failures log the bounded diagnostic dump before returning.
pub fn decode_envelope(payload: &[u8]) -> Result<Envelope> {
    let value = from_notation(payload).map_err(|err| {
        tracing::error!(len = payload.len(), "{err}");
        for line in err.diagnostic_lines() {
            tracing::error!("{line}");
        }
        PluginError::Parse(err)
    })?;
    Envelope::from_value(value)
}

/// Read the next envelope from a framed stream.
///
/// A stream that ends between frames is reported as peer shutdown, the
/// same as one that ends mid-frame.
pub async fn read_envelope<R>(reader: &mut FramedRead<R, LeapCodec>) -> Result<Envelope>
where
    R: AsyncRead + Unpin,
{
    match reader.next().await {
        Some(Ok(payload)) => {
            tracing::trace!(len = payload.len(), "frame received");
            decode_envelope(&payload)
        }
        Some(Err(err)) => Err(err.into()),
        None => Err(FrameError::PeerShutdown("stream closed".to_string()).into()),
    }
}

/// Wrap an async reader in the LEAP frame codec.
pub fn framed_reader<R: AsyncRead>(reader: R, config: &FrameConfig) -> FramedRead<R, LeapCodec> {
    FramedRead::new(reader, LeapCodec::new(config.clone()))
}
