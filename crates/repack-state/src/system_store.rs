/*
[INPUT]:  Shared RepackClient, storage snapshots
[OUTPUT]: Cached system status, upstream config, storage snapshot + one-shot warnings
[POS]:    State layer - backend health, configuration and disk usage
[UPDATE]: When warning thresholds or system endpoints change
*/

use std::sync::Arc;

use repack_adapter::{
    ApiConfig, HealthReport, NoticeLevel, Notifier, RepackClient, StorageInfo, StorageWarning,
    SystemStatus, VersionInfo,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::validate::validate_api_config;

pub const STORAGE_WARNING_PERCENT: u32 = 85;
pub const STORAGE_CRITICAL_PERCENT: u32 = 95;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Default)]
struct SystemState {
    status: Option<SystemStatus>,
    api_config: Option<ApiConfig>,
    storage: Option<StorageInfo>,
    loading: bool,
    /// Set once the high-usage warning fired; cleared below the threshold
    warned: bool,
}

pub struct SystemStore {
    client: Arc<RepackClient>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<SystemState>,
}

impl std::fmt::Debug for SystemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemStore")
            .field("base_url", &self.client.base_url().as_str())
            .finish_non_exhaustive()
    }
}

impl SystemStore {
    pub fn new(client: Arc<RepackClient>) -> Self {
        let notifier = client.notifier();
        Self {
            client,
            notifier,
            state: Mutex::new(SystemState::default()),
        }
    }

    pub async fn system_status(&self) -> Option<SystemStatus> {
        self.state.lock().await.status.clone()
    }

    pub async fn api_config(&self) -> Option<ApiConfig> {
        self.state.lock().await.api_config.clone()
    }

    pub async fn storage_info(&self) -> Option<StorageInfo> {
        self.state.lock().await.storage
    }

    /// True while a system status request is in flight.
    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    pub async fn fetch_system_status(&self) -> Option<SystemStatus> {
        self.state.lock().await.loading = true;
        let result = self.client.system_status().await;

        let mut state = self.state.lock().await;
        state.loading = false;
        let status = result.ok()?;
        state.status = Some(status.clone());
        Some(status)
    }

    pub async fn fetch_api_config(&self) -> Option<ApiConfig> {
        let config = self.client.api_config().await.ok()?;
        self.state.lock().await.api_config = Some(config.clone());
        Some(config)
    }

    /// Validate locally, push, and keep the submitted config on success.
    pub async fn update_api_config(&self, config: &ApiConfig) -> bool {
        if let Err(err) = validate_api_config(config) {
            warn!(error = %err, "API config rejected");
            self.notifier.notify(NoticeLevel::Warning, &err.to_string());
            return false;
        }
        let Ok(response) = self.client.update_api_config(config).await else {
            return false;
        };

        self.state.lock().await.api_config = Some(config.clone());
        info!("API config updated");
        self.notifier.notify(NoticeLevel::Success, &response.message);
        true
    }

    pub async fn fetch_storage_info(&self) -> Option<StorageInfo> {
        let info = self.client.storage_info().await.ok()?;
        self.apply_storage_snapshot(info).await;
        Some(info)
    }

    /// Store a snapshot and raise the high-usage warning at most once per episode.
    pub async fn apply_storage_snapshot(&self, info: StorageInfo) {
        let usage_percent = info.usage_percent();
        let warning = {
            let mut state = self.state.lock().await;
            state.storage = Some(info);
            if usage_percent < STORAGE_WARNING_PERCENT {
                if state.warned {
                    debug!(usage_percent, "storage usage back under threshold");
                }
                state.warned = false;
                None
            } else if state.warned {
                None
            } else {
                state.warned = true;
                Some(StorageWarning {
                    usage_percent,
                    critical: usage_percent >= STORAGE_CRITICAL_PERCENT,
                })
            }
        };

        if let Some(warning) = warning {
            warn!(usage_percent, critical = warning.critical, "storage usage high");
            self.notifier.storage_warning(warning);
        }
    }

    /// Never fails; an unreachable backend yields a report with status `error`.
    pub async fn health_check(&self) -> HealthReport {
        match self.client.health_check().await {
            Ok(report) => report,
            Err(err) => HealthReport::unreachable(err.user_message()),
        }
    }

    pub async fn version(&self) -> Option<VersionInfo> {
        self.client.version().await.ok()
    }

    pub async fn storage_usage_percent(&self) -> u32 {
        self.storage_info()
            .await
            .map(|info| info.usage_percent())
            .unwrap_or(0)
    }

    pub async fn is_storage_low(&self) -> bool {
        self.storage_usage_percent().await >= STORAGE_WARNING_PERCENT
    }

    pub async fn is_storage_critical(&self) -> bool {
        self.storage_usage_percent().await >= STORAGE_CRITICAL_PERCENT
    }

    /// `12.3GB / 100.0GB (12%)`; empty before the first snapshot.
    pub async fn format_storage_usage(&self) -> String {
        self.storage_info()
            .await
            .map(|info| format_usage(&info))
            .unwrap_or_default()
    }
}

fn format_usage(info: &StorageInfo) -> String {
    format!(
        "{:.1}GB / {:.1}GB ({}%)",
        info.used_space as f64 / GIB,
        info.total_space as f64 / GIB,
        info.usage_percent()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_line_uses_gigabytes() {
        let info = StorageInfo {
            total_space: 100 * 1024 * 1024 * 1024,
            used_space: 12 * 1024 * 1024 * 1024 + 300 * 1024 * 1024,
            free_space: 0,
            upload_count: 0,
            output_count: 0,
        };
        assert_eq!(format_usage(&info), "12.3GB / 100.0GB (12%)");
    }
}
