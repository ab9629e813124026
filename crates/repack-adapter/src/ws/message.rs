/*
[INPUT]:  Raw JSON text frames from the task live-update channel
[OUTPUT]: Parsed ChannelMessage envelopes and typed payload accessors
[POS]:    WebSocket layer - message parsing and validation
[UPDATE]: When adding new message types or changing envelope format
*/

use serde::{Deserialize, Serialize};

use crate::types::{MessageKind, TaskProgress};

/// Envelope pushed by the backend: `{ type, data, timestamp }`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChannelMessage {
    #[serde(rename = "type", default = "unknown_kind")]
    pub kind: MessageKind,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

fn unknown_kind() -> MessageKind {
    MessageKind::Unknown
}

/// Streaming log line attached to a `log` envelope
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogLine {
    pub task_id: String,
    pub log: String,
    #[serde(default)]
    pub timestamp: String,
}

impl ChannelMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Progress payload, when this is a well-formed `progress` envelope
    pub fn progress(&self) -> Option<TaskProgress> {
        if self.kind != MessageKind::Progress {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }

    /// Human-readable text of a `system` envelope
    pub fn system_text(&self) -> Option<&str> {
        if self.kind != MessageKind::System {
            return None;
        }
        self.data
            .get("message")
            .and_then(|value| value.as_str())
            .or_else(|| self.data.as_str())
    }

    pub fn log_line(&self) -> Option<LogLine> {
        if self.kind != MessageKind::Log {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }
}
