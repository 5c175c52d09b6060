//! Configuration Management
//!
//! Optional persistent configuration for azscrape, overlaid by the
//! environment variables Azure Functions and the Azure SDKs use.

use crate::azure::client::{ClientOptions, DEFAULT_ENDPOINT};
use crate::scrape::DEFAULT_RUN_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default port of the HTTP trigger
pub const DEFAULT_LISTEN_PORT: u16 = 9090;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Subscription to scrape
    #[serde(default)]
    pub subscription: Option<String>,
    /// Run deadline in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// ARM endpoint (sovereign clouds)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// HTTP trigger port
    #[serde(default)]
    pub listen_port: Option<u16>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("azscrape").join("config.json"))
    }

    /// Load configuration from disk, then apply environment overrides
    pub fn load() -> Self {
        Self::load_file().with_env(|key| std::env::var(key).ok())
    }

    fn load_file() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Overlay values found through `lookup` (environment > file)
    pub fn with_env<L>(mut self, lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(subscription) = get("AZURE_SUBSCRIPTION") {
            self.subscription = Some(subscription);
        }
        if let Some(endpoint) = get("AZURE_RESOURCE_MANAGER_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Some(port) = get("FUNCTIONS_CUSTOMHANDLER_PORT") {
            match port.parse() {
                Ok(port) => self.listen_port = Some(port),
                Err(_) => tracing::warn!("Invalid FUNCTIONS_CUSTOMHANDLER_PORT: {}", port),
            }
        }
        if let Some(secs) = get("AZSCRAPE_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(secs) => self.timeout_secs = Some(secs),
                Err(_) => tracing::warn!("Invalid AZSCRAPE_TIMEOUT_SECS: {}", secs),
            }
        }

        self
    }

    /// Get effective subscription (CLI > env > config); empty if unset
    pub fn effective_subscription(&self) -> String {
        self.subscription.clone().unwrap_or_default()
    }

    /// Get effective run deadline
    pub fn effective_timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RUN_TIMEOUT)
    }

    /// Get effective HTTP trigger port
    pub fn effective_port(&self) -> u16 {
        self.listen_port.unwrap_or(DEFAULT_LISTEN_PORT)
    }

    /// Client options for the ARM factories
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            endpoint: self
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            request_timeout: self.effective_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.effective_subscription(), "");
        assert_eq!(config.effective_timeout(), Duration::from_secs(30));
        assert_eq!(config.effective_port(), 9090);
        assert_eq!(config.client_options().endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = Config {
            subscription: Some("from-file".to_string()),
            listen_port: Some(8000),
            ..Config::default()
        };
        let config = file.with_env(env(&[
            ("AZURE_SUBSCRIPTION", "from-env"),
            ("FUNCTIONS_CUSTOMHANDLER_PORT", "7071"),
        ]));

        assert_eq!(config.effective_subscription(), "from-env");
        assert_eq!(config.effective_port(), 7071);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let config = Config::default().with_env(env(&[
            ("FUNCTIONS_CUSTOMHANDLER_PORT", "not-a-port"),
            ("AZSCRAPE_TIMEOUT_SECS", "soon"),
            ("AZURE_SUBSCRIPTION", "  "),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = serde_json::from_str(r#"{"timeout_secs": 5}"#).unwrap();
        assert_eq!(config.effective_timeout(), Duration::from_secs(5));
        assert!(config.subscription.is_none());
    }
}
