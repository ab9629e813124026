/*
[INPUT]:  Backend origin, timeouts, notifier
[OUTPUT]: Configured reqwest client ready for API calls with uniform error reporting
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::http::{RepackError, Result};
use crate::notify::{NoticeLevel, Notifier, TracingNotifier};
use crate::preview::{RAW_LOG_MAX_BYTES, truncate_for_log};

/// Default backend origin
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const API_PREFIX: [&str; 2] = ["api", "v1"];

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Applies to multipart uploads instead of `timeout`
    pub upload_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(120),
        }
    }
}

/// Main HTTP client for the repack backend
pub struct RepackClient {
    http_client: Client,
    base_url: Url,
    upload_timeout: Duration,
    notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for RepackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepackClient")
            .field("base_url", &self.base_url.as_str())
            .field("upload_timeout", &self.upload_timeout)
            .finish_non_exhaustive()
    }
}

impl RepackClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_config_and_base_url(config, DEFAULT_BASE_URL)
    }

    /// Create a new client against a specific backend origin
    pub fn with_config_and_base_url(config: ClientConfig, base_url: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: normalize_base_url(base_url)?,
            upload_timeout: config.upload_timeout,
            notifier: Arc::new(TracingNotifier),
        })
    }

    /// Route failures to a different notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Notifier shared with the stores built on top of this client
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        self.notifier.clone()
    }

    pub(crate) fn upload_timeout(&self) -> Duration {
        self.upload_timeout
    }

    /// Build a URL under `/api/v1` from raw path segments
    pub fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| RepackError::Config(format!("cannot extend base URL {}", self.base_url)))?;
            path.pop_if_empty();
            path.extend(API_PREFIX);
            path.extend(segments);
        }
        Ok(url)
    }

    /// Live-update channel URL for a task (`ws` for `http`, `wss` for `https`)
    pub fn task_channel_url(&self, task_id: &str) -> Result<Url> {
        let mut url = self.api_url(&["tasks", "ws", task_id])?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(RepackError::Config(format!(
                    "unsupported base URL scheme {other}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| RepackError::Config(format!("cannot switch {url} to {scheme}")))?;
        Ok(url)
    }

    /// Build request builder for an API endpoint
    pub(crate) fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.api_url(segments)?;
        Ok(self.http_client.request(method, url))
    }

    /// Send a request and decode the JSON body, reporting any failure once
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        self.exchange(builder)
            .await
            .inspect_err(|err| self.report_failure(err))
    }

    /// Surface a failure through the global notifier
    pub(crate) fn report_failure(&self, err: &RepackError) {
        warn!(error = %err, status = ?err.status(), "api call failed");
        self.notifier.notify(NoticeLevel::Error, &err.user_message());
    }

    async fn exchange<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let request = builder.build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();
        debug!(%method, %path, "api request");

        let response = self.http_client.execute(request).await.inspect_err(|err| {
            warn!(%method, %path, error = %err, "api request error");
        })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                %method,
                %path,
                status = status.as_u16(),
                body = %truncate_for_log(&body, RAW_LOG_MAX_BYTES),
                "api response error"
            );
            return Err(RepackError::from_response_body(status, &body));
        }

        debug!(%method, %path, status = status.as_u16(), bytes = body.len(), "api response");

        let payload = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(payload).map_err(|err| {
            debug!(
                %path,
                error = %err,
                body = %truncate_for_log(&body, RAW_LOG_MAX_BYTES),
                "api response decode failed"
            );
            RepackError::Serialization(err)
        })
    }
}

fn normalize_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(RepackError::Config(format!("base URL {raw} cannot carry a path")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
