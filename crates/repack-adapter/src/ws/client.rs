/*
[INPUT]:  Task channel URL, reconnect policy, caller-supplied ChannelHandler
[OUTPUT]: Dispatched ChannelMessage / error / close callbacks + observable ChannelState
[POS]:    WebSocket layer - per-task live-update stream with linear-backoff reconnect
[UPDATE]: When changing reconnection policy, dispatch order, or teardown semantics
*/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::http::{RepackError, Result};
use crate::preview::{RAW_LOG_MAX_BYTES, truncate_for_log};
use crate::ws::message::ChannelMessage;

pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Outbound = Arc<Mutex<Option<mpsc::UnboundedSender<WsMessage>>>>;

/// Linear reconnect backoff: attempt `n` waits `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Attempt number and delay of the next reconnect, `None` once exhausted.
    pub fn next_attempt(&self, attempts_so_far: u32) -> Option<(u32, Duration)> {
        if attempts_so_far >= self.max_attempts {
            return None;
        }
        let attempt = attempts_so_far + 1;
        Some((attempt, self.delay_for(attempt)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Closed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("WebSocket connect failed: {0}")]
    Connect(String),
    #[error("WebSocket transport error: {0}")]
    Transport(String),
    #[error("malformed channel message: {0}")]
    Malformed(String),
}

/// Details handed to `on_close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelClosed {
    pub code: Option<u16>,
    pub reason: String,
    /// Attempt number of the reconnect scheduled after this close, if any
    pub reconnect_attempt: Option<u32>,
}

impl ChannelClosed {
    pub fn will_reconnect(&self) -> bool {
        self.reconnect_attempt.is_some()
    }
}

/// Callbacks invoked by a live channel, in arrival order.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    async fn on_message(&self, message: ChannelMessage);

    async fn on_error(&self, _error: &ChannelError) {}

    async fn on_close(&self, _closed: &ChannelClosed) {}
}

/// Server-push channel scoped to one task.
pub struct LiveChannel {
    url: Url,
    policy: ReconnectPolicy,
    handler: Arc<dyn ChannelHandler>,
    state: watch::Sender<ChannelState>,
    outbound: Outbound,
    shutdown: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for LiveChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveChannel")
            .field("url", &self.url.as_str())
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl LiveChannel {
    pub fn new(url: Url, handler: Arc<dyn ChannelHandler>) -> Self {
        Self::with_policy(url, ReconnectPolicy::default(), handler)
    }

    pub fn with_policy(url: Url, policy: ReconnectPolicy, handler: Arc<dyn ChannelHandler>) -> Self {
        let (state, _rx) = watch::channel(ChannelState::Idle);
        Self {
            url,
            policy,
            handler,
            state,
            outbound: Arc::new(Mutex::new(None)),
            shutdown: CancellationToken::new(),
            worker: None,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Start the connection worker, tearing down any previous one.
    pub fn connect(&mut self) -> Result<()> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(RepackError::WebSocket(
                "live channel requires a Tokio runtime".to_string(),
            ));
        }

        if self.worker.is_some() {
            self.close();
        }

        self.shutdown = CancellationToken::new();
        self.outbound = Arc::new(Mutex::new(None));
        let worker = ChannelWorker {
            url: self.url.clone(),
            policy: self.policy,
            handler: self.handler.clone(),
            state: self.state.clone(),
            outbound: self.outbound.clone(),
            shutdown: self.shutdown.clone(),
        };
        self.worker = Some(tokio::spawn(worker.run()));
        Ok(())
    }

    /// Tear down the connection and suppress any pending reconnect.
    ///
    /// Idempotent; the channel is left `Idle`.
    pub fn close(&mut self) {
        self.shutdown.cancel();
        if self.worker.take().is_some() {
            debug!(url = %self.url, "live channel torn down");
        }
        self.state.send_replace(ChannelState::Idle);
    }

    /// Send a JSON message; returns `false` without buffering unless `Open`.
    pub async fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<bool> {
        if self.state() != ChannelState::Open {
            return Ok(false);
        }
        let text = serde_json::to_string(payload)?;
        let guard = self.outbound.lock().await;
        let Some(sender) = guard.as_ref() else {
            return Ok(false);
        };
        Ok(sender.send(WsMessage::Text(text.into())).is_ok())
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

enum PumpExit {
    Shutdown,
    Closed(ChannelClosed),
}

struct ChannelWorker {
    url: Url,
    policy: ReconnectPolicy,
    handler: Arc<dyn ChannelHandler>,
    state: watch::Sender<ChannelState>,
    outbound: Outbound,
    shutdown: CancellationToken,
}

impl ChannelWorker {
    async fn run(self) {
        let mut attempts: u32 = 0;

        loop {
            self.set_state(ChannelState::Connecting);
            info!(url = %self.url, attempt = attempts, "connecting live channel");

            let connected = tokio::select! {
                _ = self.shutdown.cancelled() => return,
                result = connect_async(self.url.as_str()) => result,
            };

            let mut closed = match connected {
                Ok((socket, _response)) => {
                    attempts = 0;
                    match self.pump(socket).await {
                        PumpExit::Shutdown => return,
                        PumpExit::Closed(closed) => closed,
                    }
                }
                Err(err) => {
                    let error = ChannelError::Connect(err.to_string());
                    warn!(url = %self.url, error = %error, "live channel connect failed");
                    self.handler.on_error(&error).await;
                    ChannelClosed {
                        code: None,
                        reason: err.to_string(),
                        reconnect_attempt: None,
                    }
                }
            };

            if self.shutdown.is_cancelled() {
                return;
            }

            self.set_state(ChannelState::Closed);
            let next = self.policy.next_attempt(attempts);
            closed.reconnect_attempt = next.map(|(attempt, _)| attempt);
            info!(
                url = %self.url,
                code = ?closed.code,
                reason = %closed.reason,
                "live channel closed"
            );
            self.handler.on_close(&closed).await;

            let Some((attempt, delay)) = next else {
                warn!(
                    url = %self.url,
                    max_attempts = self.policy.max_attempts,
                    "live channel gave up reconnecting"
                );
                return;
            };

            attempts = attempt;
            info!(
                url = %self.url,
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "scheduling live channel reconnect"
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn pump(&self, socket: Socket) -> PumpExit {
        let (mut write, mut read) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        *self.outbound.lock().await = Some(outbound_tx);

        self.set_state(ChannelState::Open);
        info!(url = %self.url, "live channel open");

        let exit = loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    break PumpExit::Shutdown;
                }
                outbound = outbound_rx.recv() => {
                    let Some(message) = outbound else {
                        continue;
                    };
                    if let Err(err) = write.send(message).await {
                        let error = ChannelError::Transport(err.to_string());
                        self.handler.on_error(&error).await;
                        break PumpExit::Closed(ChannelClosed {
                            code: None,
                            reason: err.to_string(),
                            reconnect_attempt: None,
                        });
                    }
                }
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => self.dispatch(text.as_str()).await,
                        Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                            Ok(text) => self.dispatch(text).await,
                            Err(err) => self.reject(&err.to_string(), "<binary>").await,
                        },
                        Some(Ok(WsMessage::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|frame| (Some(u16::from(frame.code)), frame.reason.to_string()))
                                .unwrap_or((None, String::new()));
                            break PumpExit::Closed(ChannelClosed {
                                code,
                                reason,
                                reconnect_attempt: None,
                            });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            let error = ChannelError::Transport(err.to_string());
                            warn!(url = %self.url, error = %error, "live channel transport error");
                            self.handler.on_error(&error).await;
                            break PumpExit::Closed(ChannelClosed {
                                code: None,
                                reason: err.to_string(),
                                reconnect_attempt: None,
                            });
                        }
                        None => {
                            break PumpExit::Closed(ChannelClosed {
                                code: None,
                                reason: "stream ended".to_string(),
                                reconnect_attempt: None,
                            });
                        }
                    }
                }
            }
        };

        *self.outbound.lock().await = None;
        exit
    }

    async fn dispatch(&self, text: &str) {
        match ChannelMessage::parse(text) {
            Ok(message) => {
                debug!(url = %self.url, kind = ?message.kind, "live channel message");
                self.handler.on_message(message).await;
            }
            Err(err) => self.reject(&err.to_string(), text).await,
        }
    }

    async fn reject(&self, reason: &str, raw: &str) {
        warn!(
            url = %self.url,
            error = %reason,
            bytes = raw.len(),
            "live channel message parse failed"
        );
        debug!(
            url = %self.url,
            message = %truncate_for_log(raw, RAW_LOG_MAX_BYTES),
            "live channel message parse failed"
        );
        self.handler
            .on_error(&ChannelError::Malformed(reason.to_string()))
            .await;
    }

    /// State writes lose to a concurrent `close()`.
    fn set_state(&self, next: ChannelState) {
        let shutdown = &self.shutdown;
        self.state.send_if_modified(|current| {
            if shutdown.is_cancelled() || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
