/*
[INPUT]:  WebSocket test scenarios against a loopback server
[OUTPUT]: Test results for the live-update channel
[POS]:    Integration tests - WebSocket
[UPDATE]: When WebSocket client changes
*/

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{ChannelEvent, RecordingHandler, channel_url, next_event, spawn_ws_server};
use futures_util::{SinkExt, StreamExt};
use repack_adapter::{
    ChannelError, ChannelState, LiveChannel, MessageKind, ReconnectPolicy, TaskStatus,
};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        base_delay: Duration::from_millis(20),
        max_attempts,
    }
}

async fn wait_for_state(channel: &LiveChannel, wanted: ChannelState) {
    let mut rx = channel.subscribe_state();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|state| *state == wanted))
        .await
        .expect("timed out waiting for state")
        .expect("state sender dropped");
}

#[tokio::test]
async fn test_messages_dispatched_and_malformed_dropped() {
    let addr = spawn_ws_server(|mut ws| async move {
        let frames = [
            r#"{"type":"progress","data":{"task_id":"t1","status":"downloading","progress":40,"current_step":"download","message":"","timestamp":""}}"#,
            "this is not json",
            r#"{"type":"system","data":{"message":"maintenance soon"}}"#,
        ];
        for frame in frames {
            let _ = ws.send(Message::Text(frame.into())).await;
        }
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;

    let (handler, mut rx) = RecordingHandler::new();
    let mut channel = LiveChannel::new(channel_url(addr, "t1"), Arc::new(handler));
    channel.connect().expect("connect");

    match next_event(&mut rx).await {
        ChannelEvent::Message(message) => {
            let progress = message.progress().expect("progress payload");
            assert_eq!(progress.status, TaskStatus::Downloading);
            assert_eq!(progress.progress, 40.0);
        }
        other => panic!("expected progress message, got {other:?}"),
    }
    match next_event(&mut rx).await {
        ChannelEvent::Error(ChannelError::Malformed(_)) => {}
        other => panic!("expected malformed error, got {other:?}"),
    }
    match next_event(&mut rx).await {
        ChannelEvent::Message(message) => {
            assert_eq!(message.kind, MessageKind::System);
            assert_eq!(message.system_text(), Some("maintenance soon"));
        }
        other => panic!("expected system message, got {other:?}"),
    }

    assert_eq!(channel.state(), ChannelState::Open);
    channel.close();
    assert_eq!(channel.state(), ChannelState::Idle);
}

#[tokio::test]
async fn test_send_reaches_server_when_open() {
    let addr = spawn_ws_server(|mut ws| async move {
        while let Some(Ok(message)) = ws.next().await {
            if message.is_text() {
                let _ = ws.send(message).await;
            }
        }
    })
    .await;

    let (handler, mut rx) = RecordingHandler::new();
    let mut channel = LiveChannel::new(channel_url(addr, "t2"), Arc::new(handler));
    channel.connect().expect("connect");
    wait_for_state(&channel, ChannelState::Open).await;

    let sent = channel
        .send(&serde_json::json!({ "type": "system", "data": { "message": "echo" } }))
        .await
        .expect("send");
    assert!(sent);

    match next_event(&mut rx).await {
        ChannelEvent::Message(message) => assert_eq!(message.system_text(), Some("echo")),
        other => panic!("expected echoed message, got {other:?}"),
    }
    channel.close();
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let (handler, mut rx) = RecordingHandler::new();
    let mut channel =
        LiveChannel::with_policy(channel_url(addr, "t3"), fast_policy(2), Arc::new(handler));
    channel.connect().expect("connect");

    let mut scheduled = Vec::new();
    loop {
        match next_event(&mut rx).await {
            ChannelEvent::Error(ChannelError::Connect(_)) => {}
            ChannelEvent::Close(closed) => {
                scheduled.push(closed.reconnect_attempt);
                if !closed.will_reconnect() {
                    break;
                }
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    assert_eq!(scheduled, vec![Some(1), Some(2), None]);
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
    assert_eq!(channel.state(), ChannelState::Closed);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_reconnect_gaps_grow_linearly() {
    let base = Duration::from_millis(100);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let accepted_at = Arc::new(std::sync::Mutex::new(Vec::new()));
    let log = accepted_at.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            log.lock().unwrap().push(Instant::now());
            drop(stream);
        }
    });

    let policy = ReconnectPolicy {
        base_delay: base,
        max_attempts: 3,
    };
    let (handler, mut rx) = RecordingHandler::new();
    let mut channel = LiveChannel::with_policy(channel_url(addr, "t4"), policy, Arc::new(handler));
    channel.connect().expect("connect");

    loop {
        if let ChannelEvent::Close(closed) = next_event(&mut rx).await {
            if !closed.will_reconnect() {
                break;
            }
        }
    }

    let stamps = accepted_at.lock().unwrap().clone();
    assert_eq!(stamps.len(), 4);
    for (index, pair) in stamps.windows(2).enumerate() {
        let expected = base * (index as u32 + 1);
        let gap = pair[1] - pair[0];
        assert!(gap >= expected, "gap {gap:?} shorter than {expected:?}");
        assert!(
            gap < expected + Duration::from_millis(100),
            "gap {gap:?} far beyond {expected:?}"
        );
    }
}

#[tokio::test]
async fn test_successful_open_resets_attempts() {
    let opened = Arc::new(AtomicUsize::new(0));
    let counter = opened.clone();
    let addr = spawn_ws_server(move |mut ws| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            let _ = ws.close(None).await;
        }
    })
    .await;

    let (handler, mut rx) = RecordingHandler::new();
    let mut channel =
        LiveChannel::with_policy(channel_url(addr, "t4"), fast_policy(1), Arc::new(handler));
    channel.connect().expect("connect");

    for _ in 0..3 {
        loop {
            if let ChannelEvent::Close(closed) = next_event(&mut rx).await {
                assert_eq!(closed.reconnect_attempt, Some(1));
                break;
            }
        }
    }

    channel.close();
    assert!(opened.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn test_close_suppresses_pending_reconnect() {
    let opened = Arc::new(AtomicUsize::new(0));
    let counter = opened.clone();
    let addr = spawn_ws_server(move |mut ws| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            let _ = ws.close(None).await;
        }
    })
    .await;

    let policy = ReconnectPolicy {
        base_delay: Duration::from_millis(300),
        max_attempts: 5,
    };
    let (handler, mut rx) = RecordingHandler::new();
    let mut channel = LiveChannel::with_policy(channel_url(addr, "t5"), policy, Arc::new(handler));
    channel.connect().expect("connect");

    loop {
        if let ChannelEvent::Close(closed) = next_event(&mut rx).await {
            assert!(closed.will_reconnect());
            break;
        }
    }
    channel.close();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(channel.state(), ChannelState::Idle);
}
