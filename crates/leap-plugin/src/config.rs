use leap_frame::FrameConfig;

/// Pump the host forwards unsolicited controller events to.
pub const DEFAULT_CONTROLLER_PUMP: &str = "puppetry.controller";

/// Correlation id carried by the listen request and its acknowledgement.
pub const LISTEN_REQID: i64 = -1;

/// Configuration for a [`Plugin`](crate::Plugin).
#[derive(Debug, Clone)]
pub struct PluginConfig {
    /// Named pump to listen on after the handshake.
    pub controller_pump: String,
    /// Send the listen request during `start()`. Plugins that only talk to
    /// their reply pump can turn this off.
    pub listen: bool,
    /// Correlation id for the listen request.
    pub listen_reqid: i64,
    /// First id handed out by `send_request`.
    pub initial_request_id: i64,
    /// Framing limits for both directions.
    pub frame: FrameConfig,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            controller_pump: DEFAULT_CONTROLLER_PUMP.to_string(),
            listen: true,
            listen_reqid: LISTEN_REQID,
            initial_request_id: 1,
            frame: FrameConfig::default(),
        }
    }
}
