//! LEAP plugin runtime.
//!
//! A plugin is launched by the host with stdin/stdout connected to it. The
//! host's first message establishes a [`Session`]; after that the plugin
//! listens on a controller pump, dispatches inbound commands through a
//! [`CommandRegistry`] and sends its own requests back.
//!
//! ```no_run
//! use leap_plugin::{Plugin, PluginConfig};
//!
//! # async fn demo() -> leap_plugin::Result<()> {
//! let local = tokio::task::LocalSet::new();
//! local
//!     .run_until(async {
//!         let plugin = Plugin::stdio(PluginConfig::default());
//!         plugin.register("wave", |_args| Ok(()));
//!         plugin.start().await?;
//!         plugin.run_until_stopped().await.map(|_| ())
//!     })
//!     .await
//! # }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod session;

pub use config::{PluginConfig, DEFAULT_CONTROLLER_PUMP, LISTEN_REQID};
pub use envelope::{decode_envelope, read_envelope, Envelope};
pub use error::{HandlerError, HandlerResult, PluginError, Result};
pub use plugin::{args, InboundHandler, LoopState, Plugin, StopReason, HOST_LOG_TARGET};
pub use registry::{CommandRegistry, DispatchOutcome, Handler};
pub use session::Session;
