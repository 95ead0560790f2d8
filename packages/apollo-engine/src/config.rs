use crate::api::http::DEFAULT_API_BASE_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

pub const DATA_DIR_ENV: &str = "APOLLO_DATA_DIR";
pub const API_URL_ENV: &str = "APOLLO_API_URL";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisProviderKind {
    /// Local deterministic stub.
    #[default]
    Mock,
    /// The backend's `/ai/analyze` endpoint.
    Remote,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApolloConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_health_poll_secs")]
    pub health_poll_secs: u64,
    #[serde(default = "default_analysis_delay_ms")]
    pub analysis_delay_ms: u64,
    /// Extra wait before the wizard leaves the busy state after an analysis.
    #[serde(default)]
    pub analysis_release_grace_ms: u64,
    #[serde(default)]
    pub analysis_provider: AnalysisProviderKind,
}

pub fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_health_poll_secs() -> u64 {
    30
}

fn default_analysis_delay_ms() -> u64 {
    3000
}

impl Default for ApolloConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            health_poll_secs: default_health_poll_secs(),
            analysis_delay_ms: default_analysis_delay_ms(),
            analysis_release_grace_ms: 0,
            analysis_provider: AnalysisProviderKind::default(),
        }
    }
}

impl ApolloConfig {
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            problems.push(format!(
                "api_base_url must be an http(s) URL, got '{}'",
                self.api_base_url
            ));
        }
        if self.request_timeout_secs == 0 {
            problems.push("request_timeout_secs must be greater than zero".to_string());
        }
        if self.health_poll_secs == 0 {
            problems.push("health_poll_secs must be greater than zero".to_string());
        }
        if !problems.is_empty() {
            anyhow::bail!("Apollo config validation failed: {}", problems.join(", "));
        }
        Ok(())
    }

    /// Applies environment overrides; `lookup` is `std::env::var` outside tests.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_secs(self.health_poll_secs)
    }

    pub fn analysis_delay(&self) -> Duration {
        Duration::from_millis(self.analysis_delay_ms)
    }

    pub fn analysis_release_grace(&self) -> Duration {
        Duration::from_millis(self.analysis_release_grace_ms)
    }
}

/// `$APOLLO_DATA_DIR`, else `~/.apollo`, else `./.apollo`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".apollo"))
        .unwrap_or_else(|| PathBuf::from(".apollo"))
}

pub async fn load_config(data_dir: &Path) -> Result<ApolloConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let config = if path.exists() {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        ApolloConfig::default()
    };

    let config = config.with_overrides(|key| std::env::var(key).ok());
    config
        .validate()
        .context("Failed to validate loaded config.json")?;
    Ok(config)
}

/// Creates the data directory and writes a default `config.json` when none exists.
pub async fn ensure_config(data_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let path = data_dir.join(CONFIG_FILE);
    if !path.exists() {
        let content = serde_json::to_string_pretty(&ApolloConfig::default())?;
        fs::write(&path, content).await?;
    }
    Ok(path)
}
