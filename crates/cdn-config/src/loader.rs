//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "cdn-invalidator.toml",
    "./config/config.toml",
    "/etc/cdn-invalidator/config.toml",
];

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "CDN_INVALIDATOR_CONFIG";

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides,
    /// then validate it.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as [`ConfigLoader::load`] but reads variables through `lookup`.
    pub fn load_with<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.find_config_file(&lookup) {
            Some(path) => {
                info!(?path, "Loading configuration from file");
                AppConfig::from_file(&path)?
            }
            None => AppConfig::default(),
        };

        apply_overrides(&mut config, &lookup);
        config.finalize();
        config.validate()?;

        Ok(config)
    }

    fn find_config_file<F>(&self, lookup: &F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
            warn!(?path, "Configured config file does not exist, searching defaults");
        }

        if let Some(path) = lookup(CONFIG_PATH_ENV).map(PathBuf::from) {
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_into<T, F>(lookup: &F, key: &str, target: &mut T)
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(key) {
        match val.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value = %val, "Ignoring unparseable environment override"),
        }
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(val.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Apply environment variable overrides
fn apply_overrides<F>(config: &mut AppConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    // Retry budget (names kept from the original deployment)
    parse_into(lookup, "INVALIDATION_MAX_RETRIES", &mut config.retry.max_retries);
    parse_into(lookup, "INVALIDATION_RETRY_TIMEOUT", &mut config.retry.retry_timeout_seconds);

    // AWS
    if let Some(val) = lookup("AWS_REGION") {
        config.aws.region = val;
    }
    if let Some(val) = lookup("CDN_INVALIDATOR_AWS_ENDPOINT") {
        config.aws.endpoint_url = val;
    }

    // Queue
    if let Some(val) = lookup("CDN_INVALIDATOR_QUEUE_URLS") {
        config.queue.queue_urls = val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    parse_into(lookup, "CDN_INVALIDATOR_MAX_MESSAGES", &mut config.queue.max_messages);
    parse_into(lookup, "CDN_INVALIDATOR_WAIT_TIME_SECONDS", &mut config.queue.wait_time_seconds);
    parse_into(lookup, "CDN_INVALIDATOR_VISIBILITY_TIMEOUT", &mut config.queue.visibility_timeout);

    // Metrics
    if let Some(val) = lookup("CDN_INVALIDATOR_METRICS_ENABLED") {
        config.metrics.enabled = parse_flag(&val);
    }
    parse_into(lookup, "CDN_INVALIDATOR_METRICS_PORT", &mut config.metrics.port);

    // General
    if let Some(val) = lookup("CDN_INVALIDATOR_DEV_MODE") {
        config.dev_mode = parse_flag(&val);
    }
}
