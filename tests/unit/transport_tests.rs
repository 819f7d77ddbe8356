//! IPC 传输层多路复用测试

use channel_rpc::ipc::{
    memory_pipe, Channel, IpcError, IpcTransport, JsonLinesSink, JsonLinesSource, TransportState,
};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

/// 创建一对已连接并开始监听的传输层
fn connected_pair() -> (IpcTransport, IpcTransport) {
    let (a, b) = memory_pipe();
    let left = IpcTransport::new();
    let right = IpcTransport::new();
    left.listen(a.sink, a.source).unwrap();
    right.listen(b.sink, b.source).unwrap();
    (left, right)
}

/// 注册一个把收到的参数转发到 mpsc 的通道
fn recording_channel(name: &str) -> (Channel, mpsc::UnboundedReceiver<Vec<Value>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let channel = Channel::new(name, move |args: Vec<Value>| {
        let _ = tx.send(args);
    });
    (channel, rx)
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<Vec<Value>>) -> Vec<Value> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("等待帧超时")
        .expect("通道已关闭")
}

#[tokio::test]
async fn test_interleaved_sends_never_cross_channels() {
    let (left, right) = connected_pair();
    let (channel_a, mut rx_a) = recording_channel("A");
    let (channel_b, mut rx_b) = recording_channel("B");
    let _a = right.register_channel(channel_a);
    let _b = right.register_channel(channel_b);

    const N: i64 = 50;
    for i in 0..N {
        left.send("A", vec![json!("A"), json!(i)]).unwrap();
        left.send("B", vec![json!("B"), json!(i)]).unwrap();
    }

    for i in 0..N {
        assert_eq!(recv(&mut rx_a).await, vec![json!("A"), json!(i)]);
        assert_eq!(recv(&mut rx_b).await, vec![json!("B"), json!(i)]);
    }
    assert!(rx_a.try_recv().is_err());
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test]
async fn test_disposed_channel_receives_nothing() {
    let (left, right) = connected_pair();
    let (channel, mut rx) = recording_channel("events");
    let (sentinel, mut sentinel_rx) = recording_channel("sentinel");
    let registration = right.register_channel(channel);
    let _sentinel = right.register_channel(sentinel);

    left.send("events", vec![json!(1)]).unwrap();
    assert_eq!(recv(&mut rx).await, vec![json!(1)]);

    registration.dispose();
    assert!(!right.has_channel("events"));

    left.send("events", vec![json!(2)]).unwrap();
    left.send("sentinel", vec![]).unwrap();
    // 同一管道保序：哨兵到达时之前的帧已被处理
    recv(&mut sentinel_rx).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_replaced_channel_old_disposer_is_noop() {
    let (left, right) = connected_pair();
    let (first, mut first_rx) = recording_channel("shared");
    let (second, mut second_rx) = recording_channel("shared");

    let first_registration = right.register_channel(first);
    let _second_registration = right.register_channel(second);
    first_registration.dispose();
    assert!(right.has_channel("shared"));

    left.send("shared", vec![json!("hello")]).unwrap();
    assert_eq!(recv(&mut second_rx).await, vec![json!("hello")]);
    assert!(first_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_unknown_channel_frames_are_dropped_silently() {
    let (left, right) = connected_pair();
    let (channel, mut rx) = recording_channel("known");
    let _registration = right.register_channel(channel);

    left.send("unknown", vec![json!("lost")]).unwrap();
    left.send("known", vec![json!("kept")]).unwrap();

    assert_eq!(recv(&mut rx).await, vec![json!("kept")]);
    assert_eq!(right.state(), TransportState::Listening);
}

#[tokio::test]
async fn test_send_requires_listening_transport() {
    let transport = IpcTransport::new();
    assert_eq!(transport.state(), TransportState::Idle);
    assert!(matches!(
        transport.send("any", vec![]),
        Err(IpcError::TransportUnavailable(_))
    ));

    let (left, _right) = connected_pair();
    assert!(left.send("any", vec![]).is_ok());
    left.close();
    assert_eq!(left.state(), TransportState::Closed);
    assert!(matches!(
        left.send("any", vec![]),
        Err(IpcError::TransportUnavailable(_))
    ));
}

#[tokio::test]
async fn test_listen_twice_is_rejected() {
    let (a, b) = memory_pipe();
    let transport = IpcTransport::new();
    transport.listen(a.sink, a.source).unwrap();
    assert!(matches!(
        transport.listen(b.sink, b.source),
        Err(IpcError::TransportUnavailable(_))
    ));
}

#[tokio::test]
async fn test_peer_close_moves_transport_to_closed() {
    let (left, right) = connected_pair();
    left.close();

    for _ in 0..100 {
        if right.state() == TransportState::Closed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(right.state(), TransportState::Closed);
}

#[tokio::test]
async fn test_handler_may_register_channels_during_dispatch() {
    let (left, right) = connected_pair();
    let (late, mut late_rx) = recording_channel("late");
    let right_clone = right.clone();
    let late = std::sync::Mutex::new(Some(late));

    let _setup = right.register_channel(Channel::new("setup", move |_args: Vec<Value>| {
        if let Some(channel) = late.lock().unwrap().take() {
            // 丢弃句柄不会注销通道
            let _ = right_clone.register_channel(channel);
        }
    }));

    left.send("setup", vec![]).unwrap();
    left.send("late", vec![json!("ready")]).unwrap();
    assert_eq!(recv(&mut late_rx).await, vec![json!("ready")]);
}

#[tokio::test]
async fn test_json_lines_pipe_between_transports() {
    let (left_io, right_io) = tokio::io::duplex(4096);
    let (left_read, left_write) = tokio::io::split(left_io);
    let (right_read, right_write) = tokio::io::split(right_io);

    let left = IpcTransport::new();
    let right = IpcTransport::new();
    left.listen(JsonLinesSink::new(left_write), JsonLinesSource::new(left_read, 4096))
        .unwrap();
    right
        .listen(JsonLinesSink::new(right_write), JsonLinesSource::new(right_read, 4096))
        .unwrap();

    let (channel, mut rx) = recording_channel("telemetry");
    let _registration = right.register_channel(channel);

    left.send("telemetry", vec![json!({"cpu": 0.5}), json!("tag")])
        .unwrap();
    assert_eq!(recv(&mut rx).await, vec![json!({"cpu": 0.5}), json!("tag")]);
    assert_eq!(right.channel_names(), vec!["telemetry".to_string()]);
}
