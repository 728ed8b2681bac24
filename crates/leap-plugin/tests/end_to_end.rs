//! A fake host on the other end of an in-memory pipe.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use leap_frame::LeapCodec;
use leap_llsd::{from_notation, Value};
use leap_plugin::{args, Envelope, LoopState, Plugin, PluginConfig, PluginError, StopReason};
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::LocalSet;
use tokio_util::codec::{FramedRead, FramedWrite};

type TestPlugin = Plugin<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

struct Host {
    rx: FramedRead<ReadHalf<DuplexStream>, LeapCodec>,
    tx: FramedWrite<WriteHalf<DuplexStream>, LeapCodec>,
}

impl Host {
    async fn send(&mut self, notation: &str) {
        self.tx
            .send(Bytes::copy_from_slice(notation.as_bytes()))
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> Envelope {
        let payload = self.rx.next().await.unwrap().unwrap();
        Envelope::from_value(from_notation(&payload).unwrap()).unwrap()
    }

    /// Startup frame, then acknowledge the listen request.
    async fn handshake(&mut self) -> Envelope {
        self.send(STARTUP).await;
        let listen = self.recv().await;
        self.send("{'pump':'reply-pump','data':{'reqid':i-1,'status':1}}")
            .await;
        listen
    }
}

const STARTUP: &str = "{'data':{'command':'18ce5015-b651-1d2e-2470-0de841fd3635','features':{}},'pump':'54481a53-c41f-4fc2-606e-516daed03636'}";

fn pair() -> (TestPlugin, Host) {
    let (plugin_side, host_side) = tokio::io::duplex(64 * 1024);
    let (r, w) = tokio::io::split(plugin_side);
    let (hr, hw) = tokio::io::split(host_side);
    let host = Host {
        rx: FramedRead::new(hr, LeapCodec::default()),
        tx: FramedWrite::new(hw, LeapCodec::default()),
    };
    (Plugin::new(r, w, PluginConfig::default()), host)
}

fn recorder(plugin: &TestPlugin) -> Rc<RefCell<Vec<Envelope>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    plugin.set_inbound_handler(move |envelope| {
        sink.borrow_mut().push(envelope.clone());
        Ok(())
    });
    seen
}

#[tokio::test]
async fn listen_request_shape() {
    LocalSet::new()
        .run_until(async {
            let (plugin, mut host) = pair();
            let starting = tokio::task::spawn_local({
                let plugin = plugin.clone();
                async move { plugin.start().await }
            });

            let listen = host.handshake().await;
            starting.await.unwrap().unwrap();

            assert_eq!(listen.pump, "18ce5015-b651-1d2e-2470-0de841fd3635");
            assert_eq!(listen.data.get("op"), Some(&Value::from("listen")));
            assert_eq!(listen.data.get("reqid"), Some(&Value::Integer(-1)));
            assert_eq!(listen.data.get("source"), Some(&Value::from("puppetry.controller")));
            let reply = Value::from("54481a53-c41f-4fc2-606e-516daed03636");
            assert_eq!(listen.data.get("listener"), Some(&reply));
            assert_eq!(listen.data.get("reply"), Some(&reply));
            assert_eq!(plugin.state(), LoopState::Running);
        })
        .await;
}

#[tokio::test]
async fn events_before_ack_are_discarded() {
    LocalSet::new()
        .run_until(async {
            let (plugin, mut host) = pair();
            let seen = recorder(&plugin);
            let starting = tokio::task::spawn_local({
                let plugin = plugin.clone();
                async move { plugin.start().await }
            });

            host.send(STARTUP).await;
            host.recv().await;
            host.send("{'pump':'noise','data':{'reqid':i7}}").await;
            host.send("{'pump':'reply-pump','data':{'reqid':i-1,'status':1}}")
                .await;
            starting.await.unwrap().unwrap();

            // the listen request did not consume a request id
            let id = plugin.send_request("target", Value::map()).await.unwrap();
            assert_eq!(id, Some(1));
            host.recv().await;
            assert!(seen.borrow().is_empty());
        })
        .await;
}

#[tokio::test]
async fn refused_listen_fails_start() {
    LocalSet::new()
        .run_until(async {
            let (plugin, mut host) = pair();
            let starting = tokio::task::spawn_local({
                let plugin = plugin.clone();
                async move { plugin.start().await }
            });

            host.send(STARTUP).await;
            host.recv().await;
            host.send("{'pump':'reply-pump','data':{'reqid':i-1,'status':0}}")
                .await;

            let err = starting.await.unwrap().unwrap_err();
            assert!(matches!(err, PluginError::Handshake(_)), "{err}");
            assert_eq!(plugin.state(), LoopState::Stopped);
        })
        .await;
}

#[tokio::test]
async fn stop_command_ends_loop_without_inbound_fallback() {
    LocalSet::new()
        .run_until(async {
            let (plugin, mut host) = pair();
            let seen = recorder(&plugin);
            let starting = tokio::task::spawn_local({
                let plugin = plugin.clone();
                async move { plugin.start().await }
            });
            host.handshake().await;
            starting.await.unwrap().unwrap();

            host.send("{'pump':'puppetry.controller','data':{'command':'stop','args':{}}}")
                .await;
            let reason = plugin.run_until_stopped().await.unwrap();

            assert_eq!(reason, StopReason::Requested);
            assert_eq!(plugin.state(), LoopState::Stopped);
            assert!(seen.borrow().is_empty());
        })
        .await;
}

#[tokio::test]
async fn commands_dispatch_and_unknown_fall_back() {
    LocalSet::new()
        .run_until(async {
            let (plugin, mut host) = pair();
            let seen = recorder(&plugin);
            let moves = Rc::new(RefCell::new(Vec::new()));
            let sink = Rc::clone(&moves);
            plugin.register("move", move |args| {
                sink.borrow_mut().push(args.clone());
                Ok(())
            });

            let starting = tokio::task::spawn_local({
                let plugin = plugin.clone();
                async move { plugin.start().await }
            });
            host.handshake().await;
            starting.await.unwrap().unwrap();

            host.send("{'pump':'c','data':{'command':'move','args':{'x':r0.5}}}")
                .await;
            host.send("{'pump':'c','data':{'command':'dance'}}").await;
            host.send("{'pump':'c','data':{'reqid':i4,'status':1}}").await;
            host.send("{'pump':'c','data':{'command':'stop'}}").await;
            plugin.run_until_stopped().await.unwrap();

            assert_eq!(moves.borrow().len(), 1);
            assert_eq!(moves.borrow()[0].get("x"), Some(&Value::Real(0.5)));
            let fallback = seen.borrow();
            assert_eq!(fallback.len(), 2);
            assert_eq!(fallback[0].command(), Some("dance"));
            assert_eq!(fallback[1].reqid(), Some(4));
        })
        .await;
}

#[tokio::test]
async fn failing_handler_does_not_stop_loop() {
    LocalSet::new()
        .run_until(async {
            let (plugin, mut host) = pair();
            let seen = recorder(&plugin);
            plugin.register("bad", |_| Err("no such joint".into()));

            let starting = tokio::task::spawn_local({
                let plugin = plugin.clone();
                async move { plugin.start().await }
            });
            host.handshake().await;
            starting.await.unwrap().unwrap();

            host.send("{'pump':'c','data':{'command':'bad'}}").await;
            host.send("{'pump':'c','data':{'command':'stop'}}").await;
            assert_eq!(plugin.run_until_stopped().await.unwrap(), StopReason::Requested);
            assert!(seen.borrow().is_empty());
        })
        .await;
}

#[tokio::test]
async fn host_closing_stream_stops_cleanly() {
    LocalSet::new()
        .run_until(async {
            let (plugin, mut host) = pair();
            let starting = tokio::task::spawn_local({
                let plugin = plugin.clone();
                async move { plugin.start().await }
            });
            host.handshake().await;
            starting.await.unwrap().unwrap();

            host.tx.get_mut().shutdown().await.unwrap();
            assert_eq!(plugin.run_until_stopped().await.unwrap(), StopReason::PeerShutdown);
        })
        .await;
}

#[tokio::test]
async fn garbage_payload_is_fatal() {
    LocalSet::new()
        .run_until(async {
            let (plugin, mut host) = pair();
            let starting = tokio::task::spawn_local({
                let plugin = plugin.clone();
                async move { plugin.start().await }
            });
            host.handshake().await;
            starting.await.unwrap().unwrap();

            host.send("{'pump':'c','data':{'command':").await;
            let err = plugin.run_until_stopped().await.unwrap_err();
            assert!(matches!(err, PluginError::Parse(_)), "{err}");
            assert_eq!(plugin.state(), LoopState::Stopped);
        })
        .await;
}

#[tokio::test]
async fn bad_frame_header_is_fatal() {
    LocalSet::new()
        .run_until(async {
            let (plugin, mut host) = pair();
            let starting = tokio::task::spawn_local({
                let plugin = plugin.clone();
                async move { plugin.start().await }
            });
            host.handshake().await;
            starting.await.unwrap().unwrap();

            host.tx.get_mut().write_all(b"12x:hello").await.unwrap();
            let err = plugin.run_until_stopped().await.unwrap_err();
            assert!(matches!(err, PluginError::Frame(_)), "{err}");
        })
        .await;
}

#[tokio::test]
async fn periodic_producer_sends_increasing_ids() {
    LocalSet::new()
        .run_until(async {
            let (plugin, mut host) = pair();
            let starting = tokio::task::spawn_local({
                let plugin = plugin.clone();
                async move { plugin.start().await }
            });
            host.handshake().await;
            starting.await.unwrap().unwrap();

            let producer = plugin.spawn_periodic("helloworld", Duration::from_millis(5), |tick| {
                (tick < 3).then(|| args([("tick", Value::from(tick as i64))]))
            });

            for expected in 1..=3 {
                let sent = host.recv().await;
                assert_eq!(sent.pump, "helloworld");
                assert_eq!(sent.data.get("reqid"), Some(&Value::Integer(expected)));
                assert_eq!(sent.data.get("tick"), Some(&Value::Integer(expected - 1)));
            }
            producer.await.unwrap().unwrap();
        })
        .await;
}

#[tokio::test]
async fn non_envelope_before_ack_is_discarded() {
    LocalSet::new()
        .run_until(async {
            let (plugin, mut host) = pair();
            let starting = tokio::task::spawn_local({
                let plugin = plugin.clone();
                async move { plugin.start().await }
            });

            host.send(STARTUP).await;
            host.recv().await;
            host.send("{'pump':'noise'}").await;
            host.send("i42").await;
            host.send("{'pump':'reply-pump','data':{'reqid':i-1,'status':1}}")
                .await;

            starting.await.unwrap().unwrap();
            assert_eq!(plugin.state(), LoopState::Running);
        })
        .await;
}

#[tokio::test]
async fn non_envelope_after_start_is_skipped() {
    LocalSet::new()
        .run_until(async {
            let (plugin, mut host) = pair();
            let seen = recorder(&plugin);
            let starting = tokio::task::spawn_local({
                let plugin = plugin.clone();
                async move { plugin.start().await }
            });
            host.handshake().await;
            starting.await.unwrap().unwrap();

            host.send("{'pump':'noise'}").await;
            host.send("['not','a','map']").await;
            host.send("{'pump':'c','data':{'command':'dance'}}").await;
            host.send("{'pump':'c','data':{'command':'stop'}}").await;

            assert_eq!(plugin.run_until_stopped().await.unwrap(), StopReason::Requested);
            let fallback = seen.borrow();
            assert_eq!(fallback.len(), 1);
            assert_eq!(fallback[0].command(), Some("dance"));
        })
        .await;
}

#[tokio::test]
async fn periodic_producer_waits_one_period_before_first_send() {
    LocalSet::new()
        .run_until(async {
            let (plugin, mut host) = pair();
            let starting = tokio::task::spawn_local({
                let plugin = plugin.clone();
                async move { plugin.start().await }
            });
            host.handshake().await;
            starting.await.unwrap().unwrap();

            let period = Duration::from_millis(200);
            let spawned = Instant::now();
            let producer = plugin.spawn_periodic("helloworld", period, |tick| {
                (tick < 1).then(Value::map)
            });

            let sent = host.recv().await;
            assert!(spawned.elapsed() >= period, "sent after {:?}", spawned.elapsed());
            assert_eq!(sent.data.get("reqid"), Some(&Value::Integer(1)));
            producer.await.unwrap().unwrap();
        })
        .await;
}
