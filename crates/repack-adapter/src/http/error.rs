/*
[INPUT]:  Error sources (HTTP, API, serialization, WebSocket, filesystem)
[OUTPUT]: Structured error types with user-facing messages and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the repack adapter
#[derive(Error, Debug)]
pub enum RepackError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Reading an upload from disk failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RepackError {
    /// Best-effort message suitable for showing to a person.
    ///
    /// Server errors yield the extracted `detail`; everything else the
    /// underlying error text.
    pub fn user_message(&self) -> String {
        match self {
            RepackError::Api { message, .. } => message.clone(),
            RepackError::Http(err) => err.to_string(),
            other => other.to_string(),
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RepackError::Http(err) => err.is_timeout() || err.is_connect(),
            RepackError::Api { status, .. } => *status >= 500,
            RepackError::WebSocket(_) => true,
            _ => false,
        }
    }

    /// Status code of a server error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            RepackError::Api { status, .. } => Some(*status),
            RepackError::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Build an API error from a status code and raw response body
    pub fn from_response_body(status: StatusCode, body: &str) -> Self {
        let message = extract_detail(body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()))
        });
        RepackError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// Pull the human-readable message out of a FastAPI-style error body.
///
/// `detail` is either a string or a list of validation entries carrying `msg`.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let detail = value.get("detail").or_else(|| value.get("message"))?;
    match detail {
        serde_json::Value::String(text) if !text.is_empty() => Some(text.clone()),
        serde_json::Value::Array(entries) => entries
            .iter()
            .find_map(|entry| entry.get("msg").and_then(|msg| msg.as_str()))
            .map(str::to_string),
        _ => None,
    }
}

/// Result type alias for repack operations
pub type Result<T> = std::result::Result<T, RepackError>;
