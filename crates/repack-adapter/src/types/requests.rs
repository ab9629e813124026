/*
[INPUT]:  Caller-supplied task parameters and listing filters
[OUTPUT]: Typed Rust request structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::enums::{ProcessMode, TaskStatus};

/// Repackage a plugin published on the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    pub author: String,
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

/// Repackage an asset attached to a GitHub release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubParams {
    pub repo: String,
    pub release: String,
    pub asset_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

/// Generic task creation body for `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreate {
    pub mode: ProcessMode,
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

/// Pagination and status filter for the task listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

/// Where the uploaded package bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    Path(PathBuf),
    Bytes { file_name: String, data: Vec<u8> },
}

/// Multipart upload that creates a local-mode task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub source: UploadSource,
    pub platform: Option<String>,
    pub suffix: Option<String>,
}

impl UploadRequest {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: UploadSource::Path(path.into()),
            platform: None,
            suffix: None,
        }
    }

    pub fn from_bytes(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            source: UploadSource::Bytes {
                file_name: file_name.into(),
                data,
            },
            platform: None,
            suffix: None,
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }
}
