// src/config.rs

//! Configuration for the data service client.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Default interval between task list refreshes.
pub const DEFAULT_TASK_REFRESH_INTERVAL_MS: u64 = 1000;

/// Raw sentinel meaning "let the implementation choose".
pub const AUTOTUNE: i64 = -1;

/// Cap on elements buffered or in flight for one iterator.
///
/// `Auto` tracks the current task count, recomputed at each task refresh.
/// The raw wire encoding is an `i64` where [`AUTOTUNE`] selects `Auto` and
/// any positive value selects `Fixed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum OutstandingRequests {
    Auto,
    Fixed(usize),
}

impl OutstandingRequests {
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl TryFrom<i64> for OutstandingRequests {
    type Error = ClientError;

    fn try_from(raw: i64) -> Result<Self> {
        if raw == AUTOTUNE {
            Ok(Self::Auto)
        } else if raw > 0 {
            Ok(Self::Fixed(raw as usize))
        } else {
            Err(ClientError::config(format!(
                "max_outstanding_requests must be positive or {} (autotune), got {}",
                AUTOTUNE, raw
            )))
        }
    }
}

impl From<OutstandingRequests> for i64 {
    fn from(value: OutstandingRequests) -> Self {
        match value {
            OutstandingRequests::Auto => AUTOTUNE,
            OutstandingRequests::Fixed(n) => n as i64,
        }
    }
}

/// Resolve the task-refresh-interval hint: the autotune sentinel selects the
/// default, any other value is taken as milliseconds.
pub fn resolve_refresh_interval_hint(hint_ms: i64) -> Result<u64> {
    if hint_ms == AUTOTUNE {
        Ok(DEFAULT_TASK_REFRESH_INTERVAL_MS)
    } else if hint_ms > 0 {
        Ok(hint_ms as u64)
    } else {
        Err(ClientError::config(format!(
            "task_refresh_interval_hint_ms must be positive or {} (autotune), got {}",
            AUTOTUNE, hint_ms
        )))
    }
}

// Client configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Dispatcher address, e.g. "localhost:5000".
    pub address: String,
    /// Wire protocol: "grpc" or "grpc+tls".
    pub protocol: String,
    // Interval between task list refreshes, in milliseconds.
    pub task_refresh_interval_ms: u64,
    /// Cap on elements buffered or in flight.
    pub max_outstanding_requests: OutstandingRequests,
    // Connection timeout for dispatcher and worker channels, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Initial delay (milliseconds) between retries of a transient RPC failure.
    pub retry_initial_delay_ms: u64,
    /// Maximum delay (milliseconds) between retries.
    pub retry_max_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            protocol: "grpc".to_string(),
            task_refresh_interval_ms: DEFAULT_TASK_REFRESH_INTERVAL_MS,
            max_outstanding_requests: OutstandingRequests::Auto,
            connect_timeout_ms: 5_000,
            retry_initial_delay_ms: 100,
            retry_max_delay_ms: 30_000,
        }
    }
}

impl FromStr for ClientConfig {
    type Err = ClientError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| ClientError::config_with_source("failed to parse TOML config", e))
    }
}

impl ClientConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config_with_source(
                format!("failed to read config file '{}'", path.display()),
                e,
            )
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `DATASVC_`. For example:
    // - `DATASVC_ADDRESS` overrides `address`
    // - `DATASVC_PROTOCOL` overrides `protocol`
    // - `DATASVC_MAX_OUTSTANDING_REQUESTS` overrides `max_outstanding_requests`
    //   (raw encoding: positive or -1 for autotune)
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("DATASVC_ADDRESS") {
            self.address = val;
        }
        if let Ok(val) = std::env::var("DATASVC_PROTOCOL") {
            self.protocol = val;
        }
        if let Ok(val) = std::env::var("DATASVC_TASK_REFRESH_INTERVAL_MS") {
            if let Ok(v) = val.parse() {
                self.task_refresh_interval_ms = v;
            }
        }
        if let Ok(val) = std::env::var("DATASVC_MAX_OUTSTANDING_REQUESTS") {
            if let Ok(raw) = val.parse::<i64>() {
                if let Ok(v) = OutstandingRequests::try_from(raw) {
                    self.max_outstanding_requests = v;
                }
            }
        }
        if let Ok(val) = std::env::var("DATASVC_CONNECT_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                self.connect_timeout_ms = v;
            }
        }
        if let Ok(val) = std::env::var("DATASVC_RETRY_INITIAL_DELAY_MS") {
            if let Ok(v) = val.parse() {
                self.retry_initial_delay_ms = v;
            }
        }
        if let Ok(val) = std::env::var("DATASVC_RETRY_MAX_DELAY_MS") {
            if let Ok(v) = val.parse() {
                self.retry_max_delay_ms = v;
            }
        }
        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(ClientError::config("address must be non-empty"));
        }
        if self.protocol.is_empty() {
            return Err(ClientError::config("protocol must be non-empty"));
        }
        if self.task_refresh_interval_ms == 0 {
            return Err(ClientError::config(
                "task_refresh_interval_ms must be greater than 0",
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ClientError::config(
                "connect_timeout_ms must be greater than 0",
            ));
        }
        if self.retry_initial_delay_ms == 0 {
            return Err(ClientError::config(
                "retry_initial_delay_ms must be greater than 0",
            ));
        }
        if self.retry_max_delay_ms < self.retry_initial_delay_ms {
            return Err(ClientError::config(
                "retry_max_delay_ms must be at least retry_initial_delay_ms",
            ));
        }
        Ok(())
    }

    /// Interval between task list refreshes.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.task_refresh_interval_ms)
    }

    /// Connection timeout for dispatcher and worker channels.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();

        assert!(config.address.is_empty());
        assert_eq!(config.protocol, "grpc");
        assert_eq!(config.task_refresh_interval_ms, 1000);
        assert_eq!(config.max_outstanding_requests, OutstandingRequests::Auto);
        assert_eq!(config.connect_timeout_ms, 5_000);
        assert_eq!(config.retry_initial_delay_ms, 100);
        assert_eq!(config.retry_max_delay_ms, 30_000);
    }

    #[test]
    fn test_default_requires_address() {
        let config = ClientConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_str_partial() {
        let toml = r#"
            address = "localhost:5000"
            task_refresh_interval_ms = 100
        "#;
        let config: ClientConfig = toml.parse().unwrap();

        assert_eq!(config.address, "localhost:5000");
        assert_eq!(config.task_refresh_interval_ms, 100);
        // Other fields should be defaults
        assert_eq!(config.protocol, "grpc");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_full() {
        let toml = r#"
            address = "dispatcher:5000"
            protocol = "grpc+tls"
            task_refresh_interval_ms = 500
            max_outstanding_requests = 16
            connect_timeout_ms = 2000
            retry_initial_delay_ms = 50
            retry_max_delay_ms = 10000
        "#;
        let config: ClientConfig = toml.parse().unwrap();

        assert_eq!(config.address, "dispatcher:5000");
        assert_eq!(config.protocol, "grpc+tls");
        assert_eq!(config.task_refresh_interval_ms, 500);
        assert_eq!(
            config.max_outstanding_requests,
            OutstandingRequests::Fixed(16)
        );
        assert_eq!(config.connect_timeout_ms, 2000);
        assert_eq!(config.retry_initial_delay_ms, 50);
        assert_eq!(config.retry_max_delay_ms, 10000);
    }

    #[test]
    fn test_from_str_autotune() {
        let toml = r#"
            address = "localhost:5000"
            max_outstanding_requests = -1
        "#;
        let config: ClientConfig = toml.parse().unwrap();
        assert!(config.max_outstanding_requests.is_auto());
    }

    #[test]
    fn test_from_str_invalid_max_outstanding() {
        let toml = r#"
            address = "localhost:5000"
            max_outstanding_requests = 0
        "#;
        let result: std::result::Result<ClientConfig, _> = toml.parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result: std::result::Result<ClientConfig, _> = "invalid = [".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"address = "localhost:7000""#).unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.address, "localhost:7000");
    }

    #[test]
    fn test_from_file_not_found() {
        let result = ClientConfig::from_file("/nonexistent/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_empty_protocol() {
        let mut config = ClientConfig::default();
        config.address = "localhost:5000".to_string();
        config.protocol = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_refresh_interval() {
        let mut config = ClientConfig::default();
        config.address = "localhost:5000".to_string();
        config.task_refresh_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_retry_delays() {
        let mut config = ClientConfig::default();
        config.address = "localhost:5000".to_string();
        config.retry_initial_delay_ms = 1000;
        config.retry_max_delay_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_outstanding_requests_raw_roundtrip() {
        assert_eq!(
            OutstandingRequests::try_from(8).unwrap(),
            OutstandingRequests::Fixed(8)
        );
        assert_eq!(
            OutstandingRequests::try_from(AUTOTUNE).unwrap(),
            OutstandingRequests::Auto
        );
        assert!(OutstandingRequests::try_from(0).is_err());
        assert!(OutstandingRequests::try_from(-2).is_err());

        assert_eq!(i64::from(OutstandingRequests::Fixed(8)), 8);
        assert_eq!(i64::from(OutstandingRequests::Auto), AUTOTUNE);
    }

    #[test]
    fn test_resolve_refresh_interval_hint() {
        assert_eq!(
            resolve_refresh_interval_hint(AUTOTUNE).unwrap(),
            DEFAULT_TASK_REFRESH_INTERVAL_MS
        );
        assert_eq!(resolve_refresh_interval_hint(250).unwrap(), 250);
        assert!(resolve_refresh_interval_hint(0).is_err());
        assert!(resolve_refresh_interval_hint(-5).is_err());
    }

    // Environment variable tests are combined into a single test to avoid
    // race conditions when tests run in parallel, since env vars are global state.
    #[test]
    fn test_env_overrides() {
        let clear = || {
            for (key, _) in std::env::vars() {
                if key.starts_with("DATASVC_") {
                    std::env::remove_var(&key);
                }
            }
        };
        clear();

        std::env::set_var("DATASVC_ADDRESS", "env-host:9000");
        std::env::set_var("DATASVC_TASK_REFRESH_INTERVAL_MS", "42");
        std::env::set_var("DATASVC_MAX_OUTSTANDING_REQUESTS", "4");

        let config = ClientConfig::default().with_env_overrides();
        assert_eq!(config.address, "env-host:9000");
        assert_eq!(config.task_refresh_interval_ms, 42);
        assert_eq!(
            config.max_outstanding_requests,
            OutstandingRequests::Fixed(4)
        );

        clear();

        // Invalid values should be ignored (keep defaults)
        std::env::set_var("DATASVC_MAX_OUTSTANDING_REQUESTS", "0");
        let config = ClientConfig::default().with_env_overrides();
        assert!(config.max_outstanding_requests.is_auto());

        clear();
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut original = ClientConfig::default();
        original.address = "localhost:5000".to_string();
        original.max_outstanding_requests = OutstandingRequests::Fixed(3);

        let toml_str = toml::to_string(&original).unwrap();
        let parsed: ClientConfig = toml_str.parse().unwrap();

        assert_eq!(original.address, parsed.address);
        assert_eq!(original.protocol, parsed.protocol);
        assert_eq!(
            original.max_outstanding_requests,
            parsed.max_outstanding_requests
        );
    }
}
