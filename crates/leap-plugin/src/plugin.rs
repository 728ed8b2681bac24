//! The plugin handle: handshake, listen, read loop and outbound sends.
//!
//! Everything runs on one thread. Tasks are spawned with
//! [`tokio::task::spawn_local`], so a [`Plugin`] must be driven from inside
//! a [`tokio::task::LocalSet`] on a current-thread runtime. Between two
//! `.await` points a task runs alone; shared state lives in `Cell`/`RefCell`
//! and no borrow is ever held across an await.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::SinkExt;
use leap_frame::LeapCodec;
use leap_llsd::{to_notation, Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::config::PluginConfig;
use crate::envelope::{framed_reader, read_envelope, Envelope};
use crate::error::{HandlerResult, PluginError, Result};
use crate::registry::{CommandRegistry, DispatchOutcome};
use crate::session::Session;

/// Lifecycle of the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Created, `start()` not called yet.
    Idle,
    /// Handshake and listen in progress.
    Connecting,
    /// Read loop active; producers may send.
    Running,
    /// Terminal. Set by `stop()`, the `stop` command or a fatal stream error.
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why the read loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` or the `stop` command.
    Requested,
    /// The host closed the stream.
    PeerShutdown,
}

/// Target of the records written by the built-in `log` command.
pub const HOST_LOG_TARGET: &str = "leap_plugin::host";

/// Fallback for events no registered command claimed.
pub type InboundHandler = Rc<dyn Fn(&Envelope) -> HandlerResult>;

struct Inner<R, W> {
    config: PluginConfig,
    state: Rc<watch::Sender<LoopState>>,
    session: OnceCell<Session>,
    registry: CommandRegistry,
    inbound: RefCell<Option<InboundHandler>>,
    next_reqid: Cell<i64>,
    reader: RefCell<Option<FramedRead<R, LeapCodec>>>,
    writer: Mutex<FramedWrite<W, LeapCodec>>,
    read_loop: RefCell<Option<JoinHandle<Result<StopReason>>>>,
}

/// A LEAP plugin bound to one input and one output stream.
///
/// Cheap to clone; clones share the same session, registry and streams.
pub struct Plugin<R, W> {
    inner: Rc<Inner<R, W>>,
}

impl<R, W> Clone for Plugin<R, W> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Plugin<tokio::io::Stdin, tokio::io::Stdout> {
    /// A plugin on the process's stdin and stdout, as launched by the host.
    pub fn stdio(config: PluginConfig) -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout(), config)
    }
}

impl<R, W> Plugin<R, W>
where
    R: AsyncRead + Unpin + 'static,
    W: AsyncWrite + Unpin + 'static,
{
    /// Create an idle plugin with the built-in `stop` and `log` commands
    /// registered.
    pub fn new(reader: R, writer: W, config: PluginConfig) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        let state = Rc::new(state);
        let registry = CommandRegistry::new();
        register_builtins(&registry, &state);

        let inner = Inner {
            reader: RefCell::new(Some(framed_reader(reader, &config.frame))),
            writer: Mutex::new(FramedWrite::new(writer, LeapCodec::new(config.frame.clone()))),
            next_reqid: Cell::new(config.initial_request_id),
            config,
            state,
            session: OnceCell::new(),
            registry,
            inbound: RefCell::new(None),
            read_loop: RefCell::new(None),
        };
        Self {
            inner: Rc::new(inner),
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.inner.config
    }

    pub fn state(&self) -> LoopState {
        *self.inner.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// The established session, or `NotConnected` before the handshake.
    pub fn session(&self) -> Result<&Session> {
        self.inner.session.get().ok_or(PluginError::NotConnected)
    }

    pub fn reply_pump(&self) -> Result<&str> {
        self.session().map(Session::reply_pump)
    }

    pub fn command_pump(&self) -> Result<&str> {
        self.session().map(Session::command_pump)
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.inner.registry
    }

    /// Bind a command name; see [`CommandRegistry::register`].
    pub fn register<F>(&self, name: impl Into<String>, handler: F) -> bool
    where
        F: Fn(&Value) -> HandlerResult + 'static,
    {
        self.inner.registry.register(name, handler)
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.inner.registry.unregister(name)
    }

    /// Handle events that no registered command claimed. Replaces any
    /// previous fallback.
    pub fn set_inbound_handler<F>(&self, handler: F)
    where
        F: Fn(&Envelope) -> HandlerResult + 'static,
    {
        *self.inner.inbound.borrow_mut() = Some(Rc::new(handler));
    }

    pub fn clear_inbound_handler(&self) {
        self.inner.inbound.borrow_mut().take();
    }

    /// Handshake, listen on the controller pump, then spawn the read loop.
    ///
    /// Returns once the loop is running. Calling it again while connecting
    /// or running does nothing; calling it after the plugin stopped fails
    /// with `NotRunning`.
    pub async fn start(&self) -> Result<()> {
        match self.state() {
            LoopState::Idle => {}
            LoopState::Connecting | LoopState::Running => return Ok(()),
            LoopState::Stopped => return Err(PluginError::NotRunning),
        }
        let Some(mut reader) = self.inner.reader.borrow_mut().take() else {
            return Err(PluginError::NotRunning);
        };
        self.inner.set_state(LoopState::Connecting);

        if let Err(err) = self.connect(&mut reader).await {
            tracing::error!(error = %err, "plugin startup failed");
            self.inner.set_state(LoopState::Stopped);
            return Err(err);
        }
        // stop() may have been called while we were waiting on the host.
        if self.state() == LoopState::Stopped {
            return Ok(());
        }

        self.inner.set_state(LoopState::Running);
        let handle = tokio::task::spawn_local(read_loop(Rc::clone(&self.inner), reader));
        *self.inner.read_loop.borrow_mut() = Some(handle);
        Ok(())
    }

    async fn connect(&self, reader: &mut FramedRead<R, LeapCodec>) -> Result<()> {
        let session = Session::read(reader).await?;
        let command_pump = session.command_pump().to_string();
        let reply_pump = session.reply_pump().to_string();
        // Only reachable from Idle, so the cell is always empty here.
        let _ = self.inner.session.set(session);

        if !self.inner.config.listen {
            return Ok(());
        }

        let listen_reqid = self.inner.config.listen_reqid;
        let controller_pump = self.inner.config.controller_pump.clone();
        let request: Value = [
            ("op", Value::from("listen")),
            ("reqid", Value::from(listen_reqid)),
            ("source", Value::from(controller_pump.as_str())),
            ("listener", Value::from(reply_pump.as_str())),
        ]
        .into_iter()
        .collect();
        self.request_with_id(&command_pump, request, listen_reqid)
            .await?;

        loop {
            let envelope = match read_envelope(reader).await {
                Ok(envelope) => envelope,
                Err(PluginError::Envelope(reason)) => {
                    tracing::warn!(%reason, "discarding non-envelope message while waiting for listen ack");
                    continue;
                }
                Err(err) => return Err(err),
            };
            if envelope.reqid() != Some(listen_reqid) {
                tracing::debug!(pump = %envelope.pump, "discarding event while waiting for listen ack");
                continue;
            }
            return match envelope.data.get("status").and_then(Value::as_bool) {
                Some(true) => {
                    tracing::info!(source = %controller_pump, "listening");
                    Ok(())
                }
                _ => Err(PluginError::Handshake(format!(
                    "host refused listen on '{controller_pump}'"
                ))),
            };
        }
    }

    /// Request the loop to stop. Takes effect at the loop's next
    /// scheduling point; an in-flight read is not interrupted.
    pub fn stop(&self) {
        self.inner.set_state(LoopState::Stopped);
    }

    /// Wait until the plugin reaches `Stopped`.
    pub async fn stopped(&self) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in `inner`, which we hold, so this cannot fail.
        let _ = rx.wait_for(|state| *state == LoopState::Stopped).await;
    }

    /// Wait for the plugin to stop and report why.
    ///
    /// Fatal stream errors (bad frames, unparseable payloads) come back as
    /// `Err`. A stop requested while the loop is parked on a read returns
    /// `Requested` without waiting for that read.
    pub async fn run_until_stopped(&self) -> Result<StopReason> {
        self.stopped().await;
        let finished = self
            .inner
            .read_loop
            .borrow()
            .as_ref()
            .is_some_and(JoinHandle::is_finished);
        if !finished {
            return Ok(StopReason::Requested);
        }
        let Some(handle) = self.inner.read_loop.borrow_mut().take() else {
            return Ok(StopReason::Requested);
        };
        match handle.await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "read loop task failed");
                Ok(StopReason::Requested)
            }
        }
    }

    /// Send `data` to `pump` as-is.
    pub async fn send(&self, pump: &str, data: Value) -> Result<()> {
        let envelope = Envelope::new(pump, data);
        let payload = Bytes::from(envelope.to_notation());
        tracing::debug!(pump, len = payload.len(), "sending");

        let result = self.inner.writer.lock().await.send(payload).await;
        if let Err(err) = result {
            let err = PluginError::from(err);
            if err.is_peer_shutdown() {
                tracing::info!("host stopped reading our output");
                self.inner.set_state(LoopState::Stopped);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Send a request to `pump`, tagging it with a fresh correlation id and
    /// our reply pump.
    ///
    /// Existing `reqid`/`reply` keys in `data` win. The id is consumed even
    /// when `data` is not a map; then nothing is merged, a diagnostic is
    /// logged and `None` is returned.
    pub async fn send_request(&self, pump: &str, data: Value) -> Result<Option<i64>> {
        if self.state() == LoopState::Stopped {
            return Err(PluginError::NotRunning);
        }
        self.session()?;
        let reqid = self.inner.next_reqid.get();
        self.inner.next_reqid.set(reqid + 1);
        self.request_with_id(pump, data, reqid).await
    }

    async fn request_with_id(&self, pump: &str, mut data: Value, reqid: i64) -> Result<Option<i64>> {
        let reply_pump = self.reply_pump()?.to_string();
        let tagged = match data.as_map_mut() {
            Some(map) => {
                map.entry("reqid".to_string())
                    .or_insert(Value::Integer(reqid));
                map.entry("reply".to_string())
                    .or_insert(Value::String(reply_pump));
                Some(reqid)
            }
            None => {
                tracing::warn!(
                    pump,
                    kind = data.type_name(),
                    "request data is not a map, sending without reqid/reply"
                );
                None
            }
        };
        self.send(pump, data).await?;
        Ok(tagged)
    }

    /// Spawn a producer that calls `build` every `period` and sends the
    /// result as a request to `pump`. The first send happens one full
    /// `period` after spawning.
    ///
    /// `build` gets the tick number and returns `None` to end the producer.
    /// Ticks before the loop is running are skipped; the producer exits
    /// once the plugin stops.
    pub fn spawn_periodic<F>(
        &self,
        pump: impl Into<String>,
        period: Duration,
        mut build: F,
    ) -> JoinHandle<Result<()>>
    where
        F: FnMut(u64) -> Option<Value> + 'static,
    {
        let plugin = self.clone();
        let pump = pump.into();
        tokio::task::spawn_local(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut tick = 0u64;
            loop {
                interval.tick().await;
                match plugin.state() {
                    LoopState::Stopped => return Ok(()),
                    LoopState::Idle | LoopState::Connecting => continue,
                    LoopState::Running => {}
                }
                let Some(data) = build(tick) else {
                    return Ok(());
                };
                tick += 1;
                plugin.send_request(&pump, data).await?;
            }
        })
    }
}

impl<R, W> Inner<R, W> {
    fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    fn set_state(&self, next: LoopState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!(from = %prev, to = %next, "loop state");
        }
    }

    fn handle_inbound(&self, envelope: Envelope) {
        tracing::debug!(pump = %envelope.pump, command = ?envelope.command(), "inbound event");
        let outcome = self.registry.dispatch(&envelope.data);
        if outcome.is_handled() {
            return;
        }
        if let DispatchOutcome::Malformed { .. } = outcome {
            tracing::debug!("passing non-command event to inbound handler");
        }

        let handler = self.inbound.borrow().clone();
        match handler {
            Some(handler) => {
                if let Err(error) = handler(&envelope) {
                    tracing::warn!(pump = %envelope.pump, %error, "inbound handler failed");
                }
            }
            None => tracing::debug!(pump = %envelope.pump, "no inbound handler, event dropped"),
        }
    }
}

async fn read_loop<R, W>(
    inner: Rc<Inner<R, W>>,
    mut reader: FramedRead<R, LeapCodec>,
) -> Result<StopReason>
where
    R: AsyncRead + Unpin,
{
    let result = loop {
        if inner.state() == LoopState::Stopped {
            break Ok(StopReason::Requested);
        }
        match read_envelope(&mut reader).await {
            Ok(envelope) => inner.handle_inbound(envelope),
            Err(PluginError::Envelope(reason)) => {
                tracing::error!(%reason, "skipping message that is not an envelope");
            }
            Err(err) if err.is_peer_shutdown() => {
                tracing::info!("host closed the stream");
                break Ok(StopReason::PeerShutdown);
            }
            Err(err) => {
                tracing::error!(error = %err, "read loop stopped on a fatal stream error");
                break Err(err);
            }
        }
    };
    // No await between here and return: waiters woken by this state change
    // always observe the task as finished.
    inner.set_state(LoopState::Stopped);
    result
}

fn register_builtins(registry: &CommandRegistry, state: &Rc<watch::Sender<LoopState>>) {
    let state = Rc::clone(state);
    registry.register("stop", move |_| {
        tracing::info!("stop requested by host");
        state.send_replace(LoopState::Stopped);
        Ok(())
    });
    registry.register("log", |args| {
        let text = to_notation(args);
        tracing::info!(target: HOST_LOG_TARGET, "{}", String::from_utf8_lossy(&text));
        Ok(())
    });
}

/// Build an args map from pairs, for use with [`Plugin::send_request`].
pub fn args<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Value
where
    K: Into<String>,
    V: Into<Value>,
{
    Value::Map(
        pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<Map>(),
    )
}
