/*
[INPUT]:  Test configuration and mock backend requirements
[OUTPUT]: Shared fixtures: recording notifier, combined HTTP + WebSocket backend
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for repack-state tests

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use repack_adapter::{NoticeLevel, Notifier, RepackClient, StorageWarning};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use wiremock::MockServer;

/// Notifier that keeps every notice and storage warning for later assertions
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
    warnings: Mutex<Vec<StorageWarning>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<StorageWarning> {
        self.warnings.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().unwrap().push((level, message.to_string()));
    }

    fn storage_warning(&self, warning: StorageWarning) {
        self.warnings.lock().unwrap().push(warning);
    }
}

/// wiremock for REST plus a WebSocket endpoint on one origin.
///
/// Connections whose request line targets `/api/v1/tasks/ws/{id}` are
/// upgraded and handed to the session; everything else is piped to wiremock.
pub struct Backend {
    pub http: MockServer,
    pub addr: SocketAddr,
}

impl Backend {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self, notifier: Arc<RecordingNotifier>) -> Arc<RepackClient> {
        client_at(&self.base_url(), notifier)
    }
}

pub fn client_at(base_url: &str, notifier: Arc<RecordingNotifier>) -> Arc<RepackClient> {
    let client = RepackClient::with_config_and_base_url(Default::default(), base_url)
        .expect("client init")
        .with_notifier(notifier);
    Arc::new(client)
}

const WS_PREFIX: &str = "GET /api/v1/tasks/ws/";

pub async fn spawn_backend<F, Fut>(session: F) -> Backend
where
    F: Fn(String, WebSocketStream<TcpStream>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let http = MockServer::start().await;
    let upstream = *http.address();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind backend");
    let addr = listener.local_addr().expect("local addr");
    let session = Arc::new(session);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let session = session.clone();
            tokio::spawn(async move {
                let mut head = [0u8; 256];
                let Ok(read) = stream.peek(&mut head).await else {
                    return;
                };
                let head = String::from_utf8_lossy(&head[..read]).to_string();

                if let Some(rest) = head.strip_prefix(WS_PREFIX) {
                    let task_id = rest.split([' ', '?']).next().unwrap_or_default().to_string();
                    if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                        (*session)(task_id, ws).await;
                    }
                } else if let Ok(mut target) = TcpStream::connect(upstream).await {
                    let _ = tokio::io::copy_bidirectional(&mut stream, &mut target).await;
                }
            });
        }
    });

    Backend { http, addr }
}

/// A local port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn task_json(task_id: &str, status: &str, progress: f64) -> Value {
    json!({
        "id": 1,
        "task_id": task_id,
        "task_name": null,
        "mode": "market",
        "status": status,
        "parameters": {"author": "langgenius", "name": "openai", "version": "0.0.9"},
        "progress": progress,
        "current_step": null,
        "total_steps": 5,
        "created_at": "2024-05-01T08:00:00",
        "started_at": null,
        "completed_at": null,
        "input_file_path": null,
        "output_file_path": null,
        "file_size": null,
        "error_message": null
    })
}

pub fn progress_frame(task_id: &str, status: &str, progress: f64, step: &str) -> String {
    json!({
        "type": "progress",
        "data": {
            "task_id": task_id,
            "status": status,
            "progress": progress,
            "current_step": step,
            "message": "",
            "timestamp": "2024-05-01T08:00:05"
        },
        "timestamp": "2024-05-01T08:00:05"
    })
    .to_string()
}
