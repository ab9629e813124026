/*
[INPUT]:  Backend response schemas (tasks, files, storage, system)
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::enums::{FileKind, ProcessMode, TaskStatus};

/// A backend repackaging job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: i64,
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    pub mode: ProcessMode,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default = "default_total_steps")]
    pub total_steps: u32,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn default_total_steps() -> u32 {
    5
}

impl Task {
    /// Overwrite the progress-tracked fields from a live event.
    ///
    /// Returns `false` and leaves the task untouched once it is terminal.
    pub fn apply_progress(&mut self, event: &TaskProgress) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = event.status;
        self.progress = event.progress;
        self.current_step = Some(event.current_step.clone());
        true
    }
}

/// Partial task update pushed over the live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

/// Point-in-time disk usage of the backend's storage directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub total_space: u64,
    pub used_space: u64,
    pub free_space: u64,
    #[serde(default)]
    pub upload_count: u64,
    #[serde(default)]
    pub output_count: u64,
}

impl StorageInfo {
    /// Used space as a whole percentage; 0 when the total is unknown.
    pub fn usage_percent(&self) -> u32 {
        if self.total_space == 0 {
            return 0;
        }
        let ratio = self.used_space as f64 / self.total_space as f64;
        (ratio * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    #[serde(default)]
    pub system_info: HashMap<String, String>,
    #[serde(default)]
    pub app_info: HashMap<String, String>,
    pub timestamp: String,
}

/// Upstream endpoints the backend uses while repackaging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub github_api_url: String,
    pub marketplace_api_url: String,
    pub pip_mirror_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            github_api_url: "https://github.com".to_string(),
            marketplace_api_url: "https://marketplace.dify.ai".to_string(),
            pip_mirror_url: "https://mirrors.aliyun.com/pypi/simple".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub checks: HashMap<String, bool>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }

    /// Report standing in for a backend that could not be asked.
    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            timestamp: None,
            checks: HashMap::new(),
            issues: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub build_time: Option<String>,
    #[serde(default)]
    pub git: GitInfo,
    #[serde(default)]
    pub python_version: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_task() -> Task {
        Task {
            id: 1,
            task_id: "t1".to_string(),
            task_name: None,
            mode: ProcessMode::Market,
            status: TaskStatus::Pending,
            parameters: None,
            progress: 0.0,
            current_step: None,
            total_steps: 5,
            created_at: "2024-01-01T00:00:00".to_string(),
            started_at: None,
            completed_at: None,
            input_file_path: None,
            output_file_path: Some("/out/a.difypkg".to_string()),
            file_size: None,
            error_message: None,
        }
    }

    fn progress(status: TaskStatus, value: f64, step: &str) -> TaskProgress {
        TaskProgress {
            task_id: "t1".to_string(),
            status,
            progress: value,
            current_step: step.to_string(),
            message: String::new(),
            timestamp: String::new(),
        }
    }

    #[test]
    fn apply_progress_touches_only_tracked_fields() {
        let mut task = pending_task();
        assert!(task.apply_progress(&progress(TaskStatus::Downloading, 40.0, "download")));

        assert_eq!(task.status, TaskStatus::Downloading);
        assert_eq!(task.progress, 40.0);
        assert_eq!(task.current_step.as_deref(), Some("download"));
        assert_eq!(task.output_file_path.as_deref(), Some("/out/a.difypkg"));
        assert_eq!(task.created_at, "2024-01-01T00:00:00");
    }

    #[test]
    fn terminal_task_ignores_later_progress() {
        let mut task = pending_task();
        assert!(task.apply_progress(&progress(TaskStatus::Completed, 100.0, "done")));
        assert!(!task.apply_progress(&progress(TaskStatus::Packaging, 80.0, "pack")));

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100.0);
    }

    #[test]
    fn storage_usage_percent_rounds() {
        let info = StorageInfo {
            total_space: 1000,
            used_space: 854,
            free_space: 146,
            upload_count: 0,
            output_count: 0,
        };
        assert_eq!(info.usage_percent(), 85);

        let empty = StorageInfo { total_space: 0, ..info };
        assert_eq!(empty.usage_percent(), 0);
    }

    #[test]
    fn task_decodes_backend_payload() {
        let raw = r#"{
            "id": 3,
            "task_id": "abc",
            "mode": "github",
            "status": "extracting",
            "progress": 42.5,
            "current_step": "extract",
            "total_steps": 5,
            "created_at": "2024-05-01T10:00:00",
            "file_size": null
        }"#;
        let task: Task = serde_json::from_str(raw).expect("decode task");
        assert_eq!(task.mode, ProcessMode::Github);
        assert_eq!(task.status, TaskStatus::Extracting);
        assert_eq!(task.file_size, None);
    }
}
