/*
[INPUT]:  User-facing notices raised by the transport client and stores
[OUTPUT]: Notifier trait + tracing-backed default implementation
[POS]:    Notification seam - the host application renders notices
[UPDATE]: When adding notice kinds or changing the storage warning payload
*/

use std::fmt;

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        f.write_str(label)
    }
}

/// Payload of the one-shot high storage usage warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageWarning {
    pub usage_percent: u32,
    pub critical: bool,
}

impl StorageWarning {
    pub fn title(&self) -> &'static str {
        if self.critical {
            "Storage critically low"
        } else {
            "Storage running low"
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Disk usage has reached {}%, consider removing files you no longer need.",
            self.usage_percent
        )
    }
}

/// Global notification channel.
///
/// Implemented by the embedding application (toast, dialog, status line).
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);

    fn storage_warning(&self, warning: StorageWarning) {
        let level = if warning.critical {
            NoticeLevel::Error
        } else {
            NoticeLevel::Warning
        };
        self.notify(level, &warning.message());
    }
}

/// Notifier that only writes to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info | NoticeLevel::Success => info!(%level, message, "notice"),
            NoticeLevel::Warning => warn!(%level, message, "notice"),
            NoticeLevel::Error => error!(%level, message, "notice"),
        }
    }

    fn storage_warning(&self, warning: StorageWarning) {
        warn!(
            usage_percent = warning.usage_percent,
            critical = warning.critical,
            title = warning.title(),
            "storage warning"
        );
    }
}
