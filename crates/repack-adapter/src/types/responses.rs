/*
[INPUT]:  Backend acknowledgement payloads
[OUTPUT]: Typed Rust response structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};

use super::models::ApiConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub task_id: String,
    pub filename: String,
    #[serde(default)]
    pub size: Option<u64>,
    pub status: String,
}

/// Plain `{ "message": ... }` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdateResponse {
    #[serde(default)]
    pub message: String,
    pub config: ApiConfig,
}
