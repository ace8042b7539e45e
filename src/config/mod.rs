use crate::error::{BridgeError, Result};
use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `upstream.base_url`
pub const UPSTREAM_URL_ENV: &str = "LINT_BRIDGE_UPSTREAM_URL";

/// Main bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream linter service
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Retry policy for upstream calls
    #[serde(default)]
    pub retry: RetryConfig,
    /// Circuit breaker guarding the upstream
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Upstream linter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the linter service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of compact text
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    "http://localhost:4010".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BridgeConfig {
    /// Load configuration from a YAML file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_yaml(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| BridgeError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(UPSTREAM_URL_ENV) {
            if !url.is_empty() {
                self.upstream.base_url = url;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.upstream.base_url).map_err(|e| {
            BridgeError::Config(format!(
                "Invalid upstream URL '{}': {}",
                self.upstream.base_url, e
            ))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(BridgeError::Config(format!(
                "Upstream URL must use http or https: {}",
                self.upstream.base_url
            )));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(BridgeError::Config(
                "Upstream timeout must be > 0".to_string(),
            ));
        }

        let retry = &self.retry;
        if retry.initial_delay_ms == 0 || retry.max_delay_ms == 0 {
            return Err(BridgeError::Config(
                "Retry delays must be > 0".to_string(),
            ));
        }
        if retry.max_delay_ms < retry.initial_delay_ms {
            return Err(BridgeError::Config(
                "Retry max_delay_ms must be >= initial_delay_ms".to_string(),
            ));
        }
        if !(retry.backoff_factor >= 1.0) {
            return Err(BridgeError::Config(
                "Retry backoff_factor must be >= 1".to_string(),
            ));
        }

        let breaker = &self.circuit_breaker;
        if breaker.failure_threshold == 0 {
            return Err(BridgeError::Config(
                "Circuit breaker failure_threshold must be > 0".to_string(),
            ));
        }
        if breaker.reset_timeout_ms == 0 {
            return Err(BridgeError::Config(
                "Circuit breaker reset_timeout_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
