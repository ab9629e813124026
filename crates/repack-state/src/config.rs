/*
[INPUT]:  YAML configuration file (optional)
[OUTPUT]: Parsed console configuration with defaults for every field
[POS]:    Configuration layer - backend origin, timeouts, channel policy
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use repack_adapter::{ClientConfig, ReconnectPolicy};
use serde::{Deserialize, Serialize};
use url::Url;

const CONFIG_DIR_NAME: &str = "difypkg-repack";
const CONFIG_FILE_NAME: &str = "console.yaml";

/// Top-level configuration for the console client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConsoleConfig {
    /// Backend origin; `/api/v1` is appended per request
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Delay between a terminal progress event and the task re-fetch
    #[serde(default = "default_refresh_delay_ms")]
    pub refresh_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
}

/// Live-update channel reconnect settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChannelConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            http: HttpConfig::default(),
            channel: ChannelConfig::default(),
            refresh_delay_ms: default_refresh_delay_ms(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            upload_timeout_secs: default_upload_timeout_secs(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_base_url() -> String {
    repack_adapter::http::DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_upload_timeout_secs() -> u64 {
    120
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_refresh_delay_ms() -> u64 {
    1000
}

impl ConsoleConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file when present, otherwise fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// `<config_dir>/difypkg-repack/console.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid base_url {}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("base_url must use http or https, got {}", url.scheme()));
        }
        if self.http.timeout_secs == 0 || self.http.upload_timeout_secs == 0 {
            return Err(anyhow!("HTTP timeouts must be greater than zero"));
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.http.timeout_secs),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            upload_timeout: Duration::from_secs(self.http.upload_timeout_secs),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.channel.base_delay_ms),
            max_attempts: self.channel.max_attempts,
        }
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }
}
