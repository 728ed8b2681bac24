//! Handshake: the host's first message names the pumps for this plugin.

use leap_frame::LeapCodec;
use leap_llsd::{Map, Value};
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::envelope::{read_envelope, Envelope};
use crate::error::{PluginError, Result};

/// Pumps and capabilities announced by the host at startup.
///
/// Built once from the startup message and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    reply_pump: String,
    command_pump: String,
    features: Map,
}

impl Session {
    /// Build a session from the startup envelope.
    ///
    /// The envelope's `pump` becomes the reply pump, `data.command` the
    /// command pump, and `data.features` (a map, possibly empty) the
    /// feature set.
    pub fn from_startup(envelope: &Envelope) -> Result<Self> {
        let command_pump = envelope
            .data
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| PluginError::Handshake("startup data has no 'command' pump".into()))?;
        let features = match envelope.data.get("features") {
            Some(Value::Map(features)) => features.clone(),
            Some(other) => {
                return Err(PluginError::Handshake(format!(
                    "startup 'features' must be a map, got {}",
                    other.type_name()
                )))
            }
            None => return Err(PluginError::Handshake("startup data has no 'features'".into())),
        };
        if envelope.pump.is_empty() || command_pump.is_empty() {
            return Err(PluginError::Handshake("startup pump names are empty".into()));
        }
        Ok(Self {
            reply_pump: envelope.pump.clone(),
            command_pump: command_pump.to_string(),
            features,
        })
    }

    /// Read and validate the startup message.
    ///
    /// Anything other than a well-formed startup envelope is fatal: the
    /// plugin cannot address the host without it.
    pub async fn read<R>(reader: &mut FramedRead<R, LeapCodec>) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let envelope = read_envelope(reader).await.map_err(|err| match err {
            PluginError::Envelope(reason) => PluginError::Handshake(reason),
            other => other,
        })?;
        let session = Self::from_startup(&envelope)?;
        tracing::info!(
            reply_pump = %session.reply_pump,
            command_pump = %session.command_pump,
            features = session.features.len(),
            "session established"
        );
        Ok(session)
    }

    /// Pump the host listens on for this plugin's own traffic.
    pub fn reply_pump(&self) -> &str {
        &self.reply_pump
    }

    /// Pump that accepts operations such as `listen`.
    pub fn command_pump(&self) -> &str {
        &self.command_pump
    }

    pub fn features(&self) -> &Map {
        &self.features
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    pub fn feature(&self, name: &str) -> Option<&Value> {
        self.features.get(name)
    }
}
