//! Client configuration

use std::time::Duration;

use anyhow::{Context, Result};

/// Backend client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the ingestion backend
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Delay between job status checks in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            poll_interval_ms: 2000,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables (and `.env`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            base_url: get("ETL_API_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8000".to_string()),
            timeout_secs: get("ETL_HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse()
                .context("Invalid ETL_HTTP_TIMEOUT_SECS")?,
            poll_interval_ms: get("ETL_POLL_INTERVAL_MS")
                .unwrap_or_else(|| "2000".to_string())
                .parse()
                .context("Invalid ETL_POLL_INTERVAL_MS")?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Absolute URL of an endpoint path
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
