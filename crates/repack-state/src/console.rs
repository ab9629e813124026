/*
[INPUT]:  ConsoleConfig + application Notifier
[OUTPUT]: One shared RepackClient wired into the task, file and system stores
[POS]:    Entry point - assembles the client-side state for an embedding UI
[UPDATE]: When adding a store or changing how the client is built
*/

use std::sync::Arc;

use anyhow::{Context, Result};
use repack_adapter::{Notifier, RepackClient, TracingNotifier};
use tracing::info;

use crate::config::ConsoleConfig;
use crate::file_store::FileStore;
use crate::system_store::SystemStore;
use crate::task_store::{TaskStore, TaskStoreOptions};

#[derive(Debug)]
pub struct RepackConsole {
    client: Arc<RepackClient>,
    pub tasks: TaskStore,
    pub files: FileStore,
    pub system: SystemStore,
}

impl RepackConsole {
    pub fn from_config(config: &ConsoleConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        config.validate()?;
        let client = RepackClient::with_config_and_base_url(config.client_config(), &config.base_url)
            .context("build repack client")?
            .with_notifier(notifier);
        let client = Arc::new(client);

        let options = TaskStoreOptions {
            refresh_delay: config.refresh_delay(),
            reconnect: config.reconnect_policy(),
        };
        info!(base_url = %client.base_url(), "repack console ready");

        Ok(Self {
            tasks: TaskStore::with_options(client.clone(), options),
            files: FileStore::new(client.clone()),
            system: SystemStore::new(client.clone()),
            client,
        })
    }

    /// Default configuration, notices written to the log only.
    pub fn with_defaults() -> Result<Self> {
        Self::from_config(&ConsoleConfig::default(), Arc::new(TracingNotifier))
    }

    pub fn client(&self) -> &Arc<RepackClient> {
        &self.client
    }

    /// Close every live channel.
    pub async fn shutdown(&self) {
        self.tasks.disconnect_all().await;
    }
}
