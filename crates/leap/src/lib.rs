//! LEAP: a plugin protocol over a child process's stdin and stdout.
//!
//! The host launches the plugin, sends one startup message naming the
//! pumps to talk to, and from then on both sides exchange `length:payload`
//! frames carrying LLSD notation.
//!
//! # Crate Structure
//!
//! - [`frame`] : `length:payload` framing, blocking and async
//! - [`llsd`] : the `Value` model and notation codec
//! - [`plugin`] : session, command dispatch and event loop (behind `plugin`)

/// Re-export frame types.
pub mod frame {
    pub use leap_frame::*;
}

/// Re-export LLSD types.
pub mod llsd {
    pub use leap_llsd::*;
}

/// Re-export plugin runtime types (requires `plugin` feature).
#[cfg(feature = "plugin")]
pub mod plugin {
    pub use leap_plugin::*;
}

pub use leap_llsd::{Map, Value};
#[cfg(feature = "plugin")]
pub use leap_plugin::{Plugin, PluginConfig};
