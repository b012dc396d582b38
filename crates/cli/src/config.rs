//! Configuration loading from imagegen.toml.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Environment variable overriding the configured base URL.
pub const BASE_URL_ENV: &str = "IMAGEGEN_BASE_URL";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

/// How to reach the image service.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Total timeout per call in seconds. 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Batch pacing.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Pause between prompts in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_base_url() -> String {
    mcp::DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    mcp::DEFAULT_TIMEOUT.as_secs()
}

fn default_delay_ms() -> u64 {
    u64::try_from(batch::DEFAULT_DELAY.as_millis()).unwrap_or(u64::MAX)
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `IMAGEGEN_BASE_URL` and then the command-line flag, in that order.
    pub fn with_overrides(mut self, env_base_url: Option<String>, flag_base_url: Option<String>) -> Self {
        if let Some(url) = flag_base_url.or(env_base_url) {
            self.client.base_url = url;
        }
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self.client.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.batch.delay_ms)
    }

    /// Build the MCP client from config.
    pub fn client(&self) -> mcp::Result<mcp::Client> {
        mcp::Client::builder()
            .base_url(&self.client.base_url)
            .timeout(self.timeout())
            .build()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
