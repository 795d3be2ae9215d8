use std::time::Duration;

use serde::Deserialize;

use crate::services::workflow::RetentionInterval;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "default_retention_secs")]
    pub retention_secs: i64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_port() -> u16 { 3010 }
fn default_backend_url() -> String { "http://localhost:3000".into() }
fn default_retention_secs() -> i64 { RetentionInterval::DEFAULT_SECS }
fn default_refresh_interval_secs() -> u64 { 60 }
fn default_request_timeout_secs() -> u64 { 30 }
fn default_max_upload_bytes() -> usize { 16 * 1024 * 1024 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            backend_url: default_backend_url(),
            retention_secs: default_retention_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("CIVIC_CONSOLE").separator("__"))
            .build()?;
        let config: Self = config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid console configuration, falling back to defaults");
            Self::default()
        });
        config.retention()?;
        Ok(config)
    }

    pub fn retention(&self) -> anyhow::Result<RetentionInterval> {
        RetentionInterval::from_secs(self.retention_secs)
            .map_err(|e| anyhow::anyhow!("CIVIC_CONSOLE__RETENTION_SECS: {e}"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The countdown tick and background refresh share this interval.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}
