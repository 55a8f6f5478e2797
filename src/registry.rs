//! Active-server registry abstraction
//!
//! The monitor never decides *which* servers to poll; that comes from a
//! registry collaborator, read-only from this crate's perspective. A
//! server's enrollment (`active`) is independent of its observed health:
//! an offline server stays enrolled and keeps getting polled until an
//! operator withdraws it.

use crate::rcon::ConnectionOptions;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Registry failures. A failed read aborts the current poll cycle (there
/// is nothing to walk) but carries no state into the next one.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// Registered Servers
// ============================================================================

/// One enrolled server with its RCON credentials.
#[derive(Clone, Deserialize)]
pub struct RegisteredServer {
    /// Stable identifier used to key health, snapshot, and presence records
    pub id: String,
    /// Hostname or IP of the game server
    pub host: String,
    /// RCON listener port
    pub port: u16,
    /// RCON password
    pub password: String,
}

impl RegisteredServer {
    /// Connection options for this server, starting from defaults.
    ///
    /// Deployment-wide tuning (timeout, reconnect policy) is applied by
    /// [`MonitorConfig::connection_options`].
    ///
    /// [`MonitorConfig::connection_options`]: crate::config::MonitorConfig::connection_options
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions::new(self.host.clone(), self.port, self.password.clone())
    }
}

impl std::fmt::Debug for RegisteredServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredServer")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Registry Trait
// ============================================================================

/// Read-only feed of servers currently enrolled for monitoring.
#[async_trait]
pub trait ServerRegistry: Send + Sync {
    /// Servers to walk in the next poll cycle, with credentials.
    async fn active_servers(&self) -> Result<Vec<RegisteredServer>, RegistryError>;

    /// Human-readable backend name for logging.
    fn registry_name(&self) -> &'static str;
}

// ============================================================================
// Static Registry
// ============================================================================

/// Fixed in-memory fleet. Fits tests and small deployments whose server
/// list lives in a config file rather than a database.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    servers: Vec<RegisteredServer>,
}

impl StaticRegistry {
    pub fn new(servers: Vec<RegisteredServer>) -> Self {
        Self { servers }
    }

    /// Load a fleet from a JSON array of registered servers.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fleet file {}", path.display()))?;
        let servers: Vec<RegisteredServer> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing fleet file {}", path.display()))?;
        tracing::info!(
            fleet_file = %path.display(),
            servers = servers.len(),
            "Loaded static fleet registry"
        );
        Ok(Self { servers })
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[async_trait]
impl ServerRegistry for StaticRegistry {
    async fn active_servers(&self) -> Result<Vec<RegisteredServer>, RegistryError> {
        Ok(self.servers.clone())
    }

    fn registry_name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_static_registry_returns_all_servers() {
        let registry = StaticRegistry::new(vec![
            RegisteredServer {
                id: "alpha".to_string(),
                host: "10.0.0.1".to_string(),
                port: 2306,
                password: "pw-a".to_string(),
            },
            RegisteredServer {
                id: "bravo".to_string(),
                host: "10.0.0.2".to_string(),
                port: 2306,
                password: "pw-b".to_string(),
            },
        ]);
        let servers = registry.active_servers().await.unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].id, "alpha");
        assert_eq!(registry.registry_name(), "static");
    }

    #[tokio::test]
    async fn test_from_json_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "alpha", "host": "10.0.0.1", "port": 2306, "password": "pw"}}]"#
        )
        .unwrap();

        let registry = StaticRegistry::from_json_file(file.path()).unwrap();
        assert_eq!(registry.len(), 1);
        let servers = registry.active_servers().await.unwrap();
        assert_eq!(servers[0].host, "10.0.0.1");
        assert_eq!(servers[0].port, 2306);
    }

    #[test]
    fn test_from_json_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json at all").unwrap();
        assert!(StaticRegistry::from_json_file(file.path()).is_err());
    }

    #[test]
    fn test_registered_server_debug_redacts_password() {
        let server = RegisteredServer {
            id: "alpha".to_string(),
            host: "10.0.0.1".to_string(),
            port: 2306,
            password: "hunter2".to_string(),
        };
        let printed = format!("{server:?}");
        assert!(!printed.contains("hunter2"));
    }
}
