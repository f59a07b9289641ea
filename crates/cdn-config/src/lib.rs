//! CDN Invalidator Configuration
//!
//! TOML-based configuration with environment variable overrides. The retry budget
//! and retry delay are resolved once at process start and handed to the retry
//! controller as plain values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Largest `DelaySeconds` SQS accepts for a single message.
pub const MAX_SQS_DELAY_SECONDS: u32 = 900;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub retry: RetryConfig,
    pub queue: QueueConfig,
    pub aws: AwsConfig,
    pub metrics: MetricsConfig,

    /// Point AWS clients at LocalStack
    pub dev_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            queue: QueueConfig::default(),
            aws: AwsConfig::default(),
            metrics: MetricsConfig::default(),
            dev_mode: false,
        }
    }
}

/// Retry budget for congestion failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts allowed per logical request, first delivery included
    pub max_retries: u32,
    /// Delivery delay applied to a republished retry
    pub retry_timeout_seconds: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_timeout_seconds: 60,
        }
    }
}

/// Source queue polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub queue_urls: Vec<String>,
    /// Messages per receive call (SQS max is 10)
    pub max_messages: u32,
    /// Long poll wait (SQS max is 20)
    pub wait_time_seconds: u32,
    pub visibility_timeout: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_urls: Vec::new(),
            max_messages: 10,
            wait_time_seconds: 20,
            visibility_timeout: 120,
        }
    }
}

/// AWS client settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Empty means the SDK default provider chain decides
    pub region: String,
    /// Endpoint override, mainly for LocalStack
    pub endpoint_url: String,
}

impl AwsConfig {
    pub const LOCALSTACK_ENDPOINT: &'static str = "http://localhost:4566";

    pub fn region(&self) -> Option<&str> {
        non_empty(&self.region)
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        non_empty(&self.endpoint_url)
    }
}

/// Prometheus exporter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply dev-mode defaults that depend on other settings
    pub fn finalize(&mut self) {
        if self.dev_mode && self.aws.endpoint_url().is_none() {
            self.aws.endpoint_url = AwsConfig::LOCALSTACK_ENDPOINT.to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_retries must be at least 1".to_string(),
            ));
        }
        if self.retry.retry_timeout_seconds > MAX_SQS_DELAY_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "retry.retry_timeout_seconds must be at most {}, got {}",
                MAX_SQS_DELAY_SECONDS, self.retry.retry_timeout_seconds
            )));
        }
        if !(1..=10).contains(&self.queue.max_messages) {
            return Err(ConfigError::ValidationError(format!(
                "queue.max_messages must be between 1 and 10, got {}",
                self.queue.max_messages
            )));
        }
        if self.queue.wait_time_seconds > 20 {
            return Err(ConfigError::ValidationError(format!(
                "queue.wait_time_seconds must be at most 20, got {}",
                self.queue.wait_time_seconds
            )));
        }
        Ok(())
    }

    /// Generate example configuration TOML
    pub fn example_toml() -> String {
        r#"# CDN Invalidator Configuration

dev_mode = false             # true points AWS clients at LocalStack

[retry]
max_retries = 5              # total attempts per request
retry_timeout_seconds = 60   # delay before a retry is redelivered (max 900)

[queue]
queue_urls = ["https://sqs.us-east-1.amazonaws.com/123456789012/cdn-invalidations"]
max_messages = 10
wait_time_seconds = 20
visibility_timeout = 120

[aws]
region = "us-east-1"
endpoint_url = ""            # e.g. http://localhost:4566 for LocalStack

[metrics]
enabled = false
port = 9090
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.retry_timeout_seconds, 60);
    }

    #[test]
    fn test_example_toml_parses() {
        let config = AppConfig::from_toml(&AppConfig::example_toml()).unwrap();
        assert_eq!(config.queue.queue_urls.len(), 1);
        assert_eq!(config.aws.region(), Some("us-east-1"));
        assert_eq!(config.aws.endpoint_url(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml("[retry]\nmax_retries = 3\n").unwrap();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.retry_timeout_seconds, 60);
        assert_eq!(config.queue.max_messages, 10);
    }

    #[test]
    fn test_zero_retries_rejected() {
        let mut config = AppConfig::default();
        config.retry.max_retries = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_delay_above_sqs_limit_rejected() {
        let mut config = AppConfig::default();
        config.retry.retry_timeout_seconds = 901;
        assert!(config.validate().is_err());

        config.retry.retry_timeout_seconds = 900;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_messages_bounds() {
        let mut config = AppConfig::default();
        config.queue.max_messages = 0;
        assert!(config.validate().is_err());
        config.queue.max_messages = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dev_mode_defaults_to_localstack() {
        let mut config = AppConfig::default();
        config.dev_mode = true;
        config.finalize();
        assert_eq!(config.aws.endpoint_url(), Some(AwsConfig::LOCALSTACK_ENDPOINT));
    }

    #[test]
    fn test_dev_mode_keeps_explicit_endpoint() {
        let mut config = AppConfig::default();
        config.dev_mode = true;
        config.aws.endpoint_url = "http://localstack:4566".to_string();
        config.finalize();
        assert_eq!(config.aws.endpoint_url(), Some("http://localstack:4566"));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = AppConfig::from_toml("[retry\nmax_retries = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
