/*
[INPUT]:  Backend enum vocabularies (task status, process mode, file kind)
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When the backend adds a status, mode, or file kind
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a repackaging task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Downloading,
    Extracting,
    Packaging,
    Completed,
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Pending,
        TaskStatus::Downloading,
        TaskStatus::Extracting,
        TaskStatus::Packaging,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// No further transitions follow a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Pending or in one of the working phases.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Extracting => "extracting",
            TaskStatus::Packaging => "packaging",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the package being repackaged comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
    Market,
    Github,
    Local,
}

impl ProcessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessMode::Market => "market",
            ProcessMode::Github => "github",
            ProcessMode::Local => "local",
        }
    }
}

impl fmt::Display for ProcessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage area a file record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Input,
    Output,
    Temp,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Input => "input",
            FileKind::Output => "output",
            FileKind::Temp => "temp",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter accepted by the file listing endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFilter {
    #[default]
    All,
    Input,
    Output,
    Temp,
}

impl FileFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            FileFilter::All => "all",
            FileFilter::Input => "input",
            FileFilter::Output => "output",
            FileFilter::Temp => "temp",
        }
    }
}

/// Discriminator of a live-channel envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Progress,
    System,
    Log,
    #[serde(other)]
    Unknown,
}
