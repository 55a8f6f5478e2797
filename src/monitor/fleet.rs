//! Fleet-wide poll cycle
//!
//! One [`FleetMonitor::run_cycle`] call checks every active server once and
//! records what it saw. Each server is checked in its own task behind a
//! semaphore bound; a connection failure, store fault, or panic while
//! checking one server never affects the others, and the cycle itself never
//! errors. Cadence belongs to the caller (see [`crate::monitor::scheduler`]).
//!
//! Per server the check runs: connect, `serverinfo`, `players`, snapshot
//! append, roster reconciliation, disconnect. The health record is written
//! exactly once at the end, carrying the final outcome of the attempt:
//! `offline` when the session never came up, `error` when anything after
//! the handshake failed, `online` only when the whole check went through.

use crate::config::MonitorConfig;
use crate::monitor::roster::RosterReconciler;
use crate::rcon::RconClient;
use crate::registry::{RegisteredServer, ServerRegistry};
use crate::store::MonitorStore;
use crate::types::{HealthStatus, ServerHealthRecord, StatsSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

// ============================================================================
// Cycle Report
// ============================================================================

/// Aggregated outcome of one poll pass over the whole fleet.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CycleReport {
    /// When the pass began
    pub started_at: DateTime<Utc>,
    /// Wall-clock length of the pass
    pub duration_ms: u64,
    /// Servers the registry returned for this pass
    pub servers_checked: usize,
    /// Servers that finished the check cleanly
    pub online: usize,
    /// Servers whose session never came up
    pub offline: usize,
    /// Servers whose check failed partway through
    pub errored: usize,
    /// Players observed across all online servers
    pub players_online: u64,
}

impl CycleReport {
    fn empty(started_at: DateTime<Utc>, duration_ms: u64) -> Self {
        Self {
            started_at,
            duration_ms,
            servers_checked: 0,
            online: 0,
            offline: 0,
            errored: 0,
            players_online: 0,
        }
    }
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "checked {} server(s) in {}ms: {} online, {} offline, {} errored, {} player(s)",
            self.servers_checked,
            self.duration_ms,
            self.online,
            self.offline,
            self.errored,
            self.players_online
        )
    }
}

// ============================================================================
// Per-Server Outcome
// ============================================================================

/// Final classification of one server check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ServerOutcome {
    status: HealthStatus,
    player_count: Option<u32>,
}

impl ServerOutcome {
    fn offline() -> Self {
        Self {
            status: HealthStatus::Offline,
            player_count: None,
        }
    }

    fn errored() -> Self {
        Self {
            status: HealthStatus::Error,
            player_count: None,
        }
    }

    fn online(player_count: u32) -> Self {
        Self {
            status: HealthStatus::Online,
            player_count: Some(player_count),
        }
    }
}

// ============================================================================
// Fleet Monitor
// ============================================================================

/// Polls every active server and records health, stats, and presence.
pub struct FleetMonitor {
    registry: Arc<dyn ServerRegistry>,
    store: Arc<dyn MonitorStore>,
    config: MonitorConfig,
}

impl FleetMonitor {
    pub fn new(
        registry: Arc<dyn ServerRegistry>,
        store: Arc<dyn MonitorStore>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    /// Run one poll pass over the fleet.
    ///
    /// Never errors: a registry fault yields an empty report, and per-server
    /// faults are folded into that server's recorded status. Cycles carry no
    /// state between passes.
    pub async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        let clock = Instant::now();

        let servers = match self.registry.active_servers().await {
            Ok(servers) => servers,
            Err(e) => {
                warn!(
                    registry = self.registry.registry_name(),
                    error = %e,
                    "Registry unavailable, skipping poll cycle"
                );
                return CycleReport::empty(started_at, elapsed_ms(clock));
            }
        };

        let servers_checked = servers.len();
        debug!(servers = servers_checked, "Starting poll cycle");

        let limit = self.config.max_concurrent_checks.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut checks: JoinSet<ServerOutcome> = JoinSet::new();
        for server in servers {
            let semaphore = semaphore.clone();
            let store = self.store.clone();
            let config = self.config.clone();
            checks.spawn(async move {
                // acquire_owned only fails on a closed semaphore, which this
                // cycle never does; run unbounded rather than skip the server.
                let _permit = semaphore.acquire_owned().await.ok();
                check_server(&server, store, &config).await
            });
        }

        let mut report = CycleReport::empty(started_at, 0);
        report.servers_checked = servers_checked;
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok(outcome) => {
                    match outcome.status {
                        HealthStatus::Online => report.online += 1,
                        HealthStatus::Offline => report.offline += 1,
                        HealthStatus::Error => report.errored += 1,
                    }
                    report.players_online += u64::from(outcome.player_count.unwrap_or(0));
                }
                Err(e) => {
                    // A panicking check counts as errored; the cycle goes on.
                    warn!(error = %e, "Server check task failed");
                    report.errored += 1;
                }
            }
        }

        report.duration_ms = elapsed_ms(clock);
        info!(
            servers = report.servers_checked,
            online = report.online,
            offline = report.offline,
            errored = report.errored,
            players = report.players_online,
            duration_ms = report.duration_ms,
            "Poll cycle finished"
        );
        report
    }
}

fn elapsed_ms(clock: Instant) -> u64 {
    u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Per-Server Check
// ============================================================================

/// Check one server end to end and write its health record.
///
/// A session that never comes up is `offline`. Once the session is up, any
/// failure in the rest of the check (either query, the snapshot append, the
/// reconciliation, the teardown) classifies the server as `error`; the
/// check stops at the first failure.
async fn check_server(
    server: &RegisteredServer,
    store: Arc<dyn MonitorStore>,
    config: &MonitorConfig,
) -> ServerOutcome {
    let mut client = RconClient::new(config.connection_options(server));

    let connected = client.connect().await;
    if !connected.success {
        debug!(server_id = %server.id, detail = %connected.message, "Server unreachable");
        let outcome = ServerOutcome::offline();
        write_health(store.as_ref(), &server.id, outcome).await;
        return outcome;
    }

    let mut outcome = match observe_server(server, &mut client, store.clone()).await {
        Ok(player_count) => ServerOutcome::online(player_count),
        Err(detail) => {
            warn!(server_id = %server.id, detail = %detail, "Server check failed");
            ServerOutcome::errored()
        }
    };

    let parted = client.disconnect().await;
    if !parted.success {
        debug!(server_id = %server.id, detail = %parted.message, "Post-check disconnect failed");
        // Teardown is part of the check; losing the session mid-check
        // downgrades an otherwise clean pass.
        if outcome.status == HealthStatus::Online {
            outcome = ServerOutcome::errored();
        }
    }

    write_health(store.as_ref(), &server.id, outcome).await;
    outcome
}

/// Steps between a successful connect and the teardown: query the server,
/// append the snapshot, reconcile the roster. Returns the observed player
/// count, or a description of the first failure.
async fn observe_server(
    server: &RegisteredServer,
    client: &mut RconClient,
    store: Arc<dyn MonitorStore>,
) -> Result<u32, String> {
    // One session per server; the protocol answers one command at a time,
    // so the two queries run strictly in sequence.
    let info = client.server_info().await;
    if !info.success {
        return Err(format!("server info: {}", info.message));
    }
    let players = client.list_players().await;
    if !players.success {
        return Err(format!("player list: {}", players.message));
    }
    let roster = players.data.unwrap_or_default();

    let snapshot = StatsSnapshot {
        server_id: server.id.clone(),
        payload: info.data.unwrap_or_default(),
        collected_at: Utc::now(),
    };
    store
        .append_snapshot(snapshot)
        .await
        .map_err(|e| format!("stats snapshot: {e}"))?;

    let reconciler = RosterReconciler::new(store);
    reconciler
        .reconcile(&server.id, &roster)
        .await
        .map_err(|e| format!("roster reconciliation: {e}"))?;

    Ok(u32::try_from(roster.len()).unwrap_or(u32::MAX))
}

/// The single health write for one poll attempt.
///
/// A failed write is logged and the observed outcome still drives the cycle
/// report; it is never retried within the attempt, keeping the write count
/// at exactly one.
async fn write_health(store: &dyn MonitorStore, server_id: &str, outcome: ServerOutcome) {
    let record = ServerHealthRecord {
        server_id: server_id.to_string(),
        status: outcome.status,
        last_checked_at: Utc::now(),
        player_count: outcome.player_count,
    };
    if let Err(e) = store.update_health(record).await {
        warn!(server_id = %server_id, error = %e, "Health record write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;
    use crate::store::InMemoryStore;

    fn unreachable_server(id: &str) -> RegisteredServer {
        // Bind-then-drop leaves a port nothing is listening on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        RegisteredServer {
            id: id.to_string(),
            host: "127.0.0.1".to_string(),
            port,
            password: "pw".to_string(),
        }
    }

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            timeout_ms: 300,
            ..MonitorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_recorded_offline() {
        let store = Arc::new(InMemoryStore::new());
        let registry = Arc::new(StaticRegistry::new(vec![unreachable_server("alpha")]));
        let monitor = FleetMonitor::new(registry, store.clone(), fast_config());

        let report = monitor.run_cycle().await;

        assert_eq!(report.servers_checked, 1);
        assert_eq!(report.offline, 1);
        assert_eq!(report.online, 0);
        assert_eq!(report.players_online, 0);
        let health = store.health_of("alpha").unwrap();
        assert_eq!(health.status, HealthStatus::Offline);
        assert_eq!(health.player_count, None);
    }

    #[tokio::test]
    async fn test_empty_registry_yields_empty_report() {
        let store = Arc::new(InMemoryStore::new());
        let registry = Arc::new(StaticRegistry::new(Vec::new()));
        let monitor = FleetMonitor::new(registry, store, MonitorConfig::default());

        let report = monitor.run_cycle().await;

        assert_eq!(report.servers_checked, 0);
        assert_eq!(report.online + report.offline + report.errored, 0);
    }

    #[tokio::test]
    async fn test_one_bad_server_does_not_sink_the_cycle() {
        let store = Arc::new(InMemoryStore::new());
        let registry = Arc::new(StaticRegistry::new(vec![
            unreachable_server("alpha"),
            unreachable_server("beta"),
        ]));
        let monitor = FleetMonitor::new(registry, store.clone(), fast_config());

        let report = monitor.run_cycle().await;

        assert_eq!(report.servers_checked, 2);
        assert_eq!(report.offline, 2);
        assert!(store.health_of("alpha").is_some());
        assert!(store.health_of("beta").is_some());
    }

    #[test]
    fn test_report_display_summarizes_counts() {
        let report = CycleReport {
            started_at: Utc::now(),
            duration_ms: 42,
            servers_checked: 3,
            online: 1,
            offline: 1,
            errored: 1,
            players_online: 5,
        };
        let line = report.to_string();
        assert!(line.contains("checked 3 server(s)"));
        assert!(line.contains("1 online"));
        assert!(line.contains("5 player(s)"));
    }
}
