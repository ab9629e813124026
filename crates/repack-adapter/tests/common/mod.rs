/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for repack-adapter tests

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use repack_adapter::{
    ChannelClosed, ChannelError, ChannelHandler, ChannelMessage, NoticeLevel, Notifier,
    RepackClient,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use wiremock::MockServer;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn client_for(server: &MockServer) -> RepackClient {
    RepackClient::with_config_and_base_url(Default::default(), &server.uri())
        .expect("client init")
}

/// Notifier that keeps every notice for later assertions
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().unwrap().push((level, message.to_string()));
    }
}

#[derive(Debug)]
pub enum ChannelEvent {
    Message(ChannelMessage),
    Error(ChannelError),
    Close(ChannelClosed),
}

/// Handler forwarding every callback into an mpsc queue
pub struct RecordingHandler {
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl RecordingHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ChannelHandler for RecordingHandler {
    async fn on_message(&self, message: ChannelMessage) {
        let _ = self.tx.send(ChannelEvent::Message(message));
    }

    async fn on_error(&self, error: &ChannelError) {
        let _ = self.tx.send(ChannelEvent::Error(error.clone()));
    }

    async fn on_close(&self, closed: &ChannelClosed) {
        let _ = self.tx.send(ChannelEvent::Close(closed.clone()));
    }
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("event stream ended")
}

/// Loopback WebSocket server running `session` for every accepted connection
pub async fn spawn_ws_server<F, Fut>(session: F) -> SocketAddr
where
    F: Fn(WebSocketStream<TcpStream>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                tokio::spawn(session(ws));
            }
        }
    });
    addr
}

pub fn channel_url(addr: SocketAddr, task_id: &str) -> url::Url {
    url::Url::parse(&format!("ws://{addr}/api/v1/tasks/ws/{task_id}")).expect("channel url")
}

/// A local port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}
