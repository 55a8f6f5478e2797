//! Deployment tuning for the fleet monitor
//!
//! Every knob is an operator-tunable TOML value with a default matching the
//! documented constants, so an absent or empty config file changes nothing.
//! Per-server coordinates and credentials come from the registry; this
//! module only carries the tuning shared across the whole deployment.

use crate::rcon::connection::{ConnectionOptions, ReconnectPolicy, DEFAULT_TIMEOUT_MS};
use crate::registry::RegisteredServer;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default ceiling on concurrently-checked servers per cycle.
const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 8;

/// Deployment-wide monitor tuning.
///
/// ```toml
/// timeout_ms = 5000
/// max_concurrent_checks = 8
///
/// [reconnect]
/// max_attempts = 1
/// initial_delay_ms = 0
/// max_delay_ms = 0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Bound for each handshake and command round trip (milliseconds)
    pub timeout_ms: u64,
    /// Implicit-reconnect policy applied to every connection
    pub reconnect: ReconnectPolicy,
    /// Servers checked concurrently per cycle; 1 means strictly sequential
    pub max_concurrent_checks: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            reconnect: ReconnectPolicy::default(),
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
        }
    }
}

impl MonitorConfig {
    /// Load from a TOML file; keys the file omits keep their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading monitor config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing monitor config {}", path.display()))?;
        tracing::info!(config_file = %path.display(), "Loaded monitor config");
        Ok(config)
    }

    /// Connection options for one registry row, with this deployment's
    /// timeout and reconnect policy applied.
    pub fn connection_options(&self, server: &RegisteredServer) -> ConnectionOptions {
        server
            .connection_options()
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_reconnect_policy(self.reconnect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = MonitorConfig::default();
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.reconnect.max_attempts, 1);
        assert_eq!(config.max_concurrent_checks, 8);
    }

    #[test]
    fn test_empty_toml_parses_to_defaults() {
        let config: MonitorConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_only_named_keys() {
        let toml_str = r"
            timeout_ms = 2000

            [reconnect]
            max_attempts = 3
            initial_delay_ms = 250
        ";
        let config: MonitorConfig = toml::from_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.timeout_ms, 2000);
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.initial_delay_ms, 250);
        // Untouched keys keep defaults
        assert_eq!(config.reconnect.max_delay_ms, 0);
        assert_eq!(config.max_concurrent_checks, 8);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "max_concurrent_checks = 2").unwrap();
        let config = MonitorConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.max_concurrent_checks, 2);
        assert_eq!(config.timeout_ms, 5000);
    }

    #[test]
    fn test_connection_options_applies_deployment_tuning() {
        let config = MonitorConfig {
            timeout_ms: 1500,
            reconnect: ReconnectPolicy {
                max_attempts: 2,
                initial_delay_ms: 50,
                max_delay_ms: 100,
            },
            max_concurrent_checks: 4,
        };
        let server = RegisteredServer {
            id: "alpha".to_string(),
            host: "10.0.0.1".to_string(),
            port: 2306,
            password: "pw".to_string(),
        };
        let options = config.connection_options(&server);
        assert_eq!(options.host, "10.0.0.1");
        assert_eq!(options.port, 2306);
        assert_eq!(options.timeout, Duration::from_millis(1500));
        assert_eq!(options.reconnect.max_attempts, 2);
    }
}
