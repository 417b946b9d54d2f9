//! Configuration for the SMS proxy.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Proxy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Carrier API configuration
    #[serde(default)]
    pub carrier: CarrierConfig,

    /// Session notices
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Expiry sweeper configuration
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Which store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    /// Path to the SQLite database file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CarrierConfig {
    /// Carrier REST API URL
    #[serde(default = "default_carrier_api_url")]
    pub api_url: String,

    /// Bearer token for the carrier API
    #[serde(default)]
    pub api_token: Option<SecretString>,

    /// Request timeout
    #[serde(default = "default_carrier_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionsConfig {
    /// Sent to both participants when a session is created
    #[serde(default)]
    pub start_notice: Option<String>,

    /// Sent to both participants when a session is deleted or expires
    #[serde(default)]
    pub end_notice: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time between sweep cycles
    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Global requests per minute
    #[serde(default = "default_global_rpm")]
    pub global_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            api_url: default_carrier_api_url(),
            api_token: None,
            timeout: default_carrier_timeout(),
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_sweep_interval(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_per_minute: default_global_rpm(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Sqlite
}

fn default_store_path() -> PathBuf {
    PathBuf::from("/data/sms-proxy.db")
}

fn default_carrier_api_url() -> String {
    "http://sms-gateway:8080".into()
}

fn default_carrier_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_global_rpm() -> u32 {
    600
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_source(
            config::Environment::default()
                .separator("__")
                .try_parsing(false),
        )
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load_from(vars: &[(&str, &str)]) -> Result<Config> {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_source(
            config::Environment::default()
                .separator("__")
                .try_parsing(false)
                .source(Some(source)),
        )
    }

    #[test]
    fn test_defaults() {
        let config = load_from(&[]).unwrap();

        assert_eq!(config.server.listen_addr, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.path, PathBuf::from("/data/sms-proxy.db"));
        assert_eq!(config.carrier.api_url, "http://sms-gateway:8080");
        assert!(config.carrier.api_token.is_none());
        assert_eq!(config.carrier.timeout, Duration::from_secs(10));
        assert!(config.sessions.start_notice.is_none());
        assert!(config.sweeper.enabled);
        assert_eq!(config.sweeper.interval, Duration::from_secs(60));
        assert_eq!(config.rate_limit.global_per_minute, 600);
        assert_eq!(config.log.level, "info");
        assert!(!config.log.json);
    }

    #[test]
    fn test_environment_overrides() {
        let config = load_from(&[
            ("SERVER__PORT", "9090"),
            ("STORE__BACKEND", "memory"),
            ("CARRIER__API_TOKEN", "secret-token"),
            ("CARRIER__TIMEOUT", "2s"),
            ("SESSIONS__START_NOTICE", "You are now connected"),
            ("SWEEPER__ENABLED", "false"),
            ("SWEEPER__INTERVAL", "5m"),
            ("RATE_LIMIT__GLOBAL_PER_MINUTE", "30"),
            ("LOG__JSON", "true"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(
            config.carrier.api_token.as_ref().map(|t| t.expose_secret().as_str()),
            Some("secret-token")
        );
        assert_eq!(config.carrier.timeout, Duration::from_secs(2));
        assert_eq!(
            config.sessions.start_notice.as_deref(),
            Some("You are now connected")
        );
        assert!(!config.sweeper.enabled);
        assert_eq!(config.sweeper.interval, Duration::from_secs(300));
        assert_eq!(config.rate_limit.global_per_minute, 30);
        assert!(config.log.json);
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        assert!(load_from(&[("SWEEPER__ENABLED", "maybe")]).is_err());
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        let config = load_from(&[("CARRIER__API_TOKEN", "secret-token")]).unwrap();
        assert!(!format!("{:?}", config.carrier).contains("secret-token"));
    }
}
