//! Command name to handler table, and the dispatcher that consults it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use leap_llsd::{Map, Value};

use crate::error::{HandlerError, HandlerResult};

/// A command handler. Receives the event's `args` (an empty map when absent).
pub type Handler = Rc<dyn Fn(&Value) -> HandlerResult>;

/// What [`CommandRegistry::dispatch`] did with an event.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A handler ran and returned `Ok`.
    Handled { command: String },
    /// A handler ran and returned an error; the error was logged.
    Failed {
        command: String,
        error: HandlerError,
    },
    /// The event named a command nobody registered.
    Unknown { command: String },
    /// The event has no string `command` field.
    Malformed { reason: String },
}

impl DispatchOutcome {
    /// Whether a handler claimed the event. A failing handler still counts.
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. } | Self::Failed { .. })
    }
}

/// Shared, mutable command table.
///
/// Clones share the same table, so handlers can capture a clone and
/// register or unregister commands while being dispatched.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: Rc<RefCell<HashMap<String, Handler>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `handler`, replacing any previous binding.
    ///
    /// Returns `true` when an existing handler was replaced.
    pub fn register<F>(&self, name: impl Into<String>, handler: F) -> bool
    where
        F: Fn(&Value) -> HandlerResult + 'static,
    {
        let name = name.into();
        tracing::debug!(command = %name, "registering command");
        self.handlers
            .borrow_mut()
            .insert(name, Rc::new(handler))
            .is_some()
    }

    /// Remove the binding for `name`. Returns `false` (and logs) when there
    /// was none.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.handlers.borrow_mut().remove(name).is_some();
        if !removed {
            tracing::info!(command = name, "unregister of unknown command ignored");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.borrow().contains_key(name)
    }

    /// Registered command names, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Route an event to its handler.
    ///
    /// The table is not borrowed while the handler runs.
    pub fn dispatch(&self, event: &Value) -> DispatchOutcome {
        let Some(command) = event.get("command").and_then(Value::as_str) else {
            let reason = match event {
                Value::Map(_) => "event has no string 'command'".to_string(),
                other => format!("event is {}, not a map", other.type_name()),
            };
            tracing::warn!("{reason}");
            return DispatchOutcome::Malformed { reason };
        };
        let command = command.to_string();

        let handler = self.handlers.borrow().get(&command).cloned();
        let Some(handler) = handler else {
            tracing::warn!(
                command = %command,
                known = ?self.command_names(),
                "unknown command"
            );
            return DispatchOutcome::Unknown { command };
        };

        let empty = Value::Map(Map::new());
        let args = match event.get("args") {
            None | Some(Value::Undefined) => &empty,
            Some(args) => args,
        };

        tracing::debug!(command = %command, "dispatching command");
        match handler(args) {
            Ok(()) => DispatchOutcome::Handled { command },
            Err(error) => {
                tracing::warn!(command = %command, %error, "command handler failed");
                DispatchOutcome::Failed { command, error }
            }
        }
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.command_names())
            .finish()
    }
}
