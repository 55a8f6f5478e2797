//! In-memory store for tests and minimal deployments
//!
//! Thread-safe via `RwLock`. Not durable; everything is lost on drop. The
//! inspection accessors exist so tests and small embedded dashboards can
//! read back what the monitor wrote without widening the store trait.

use super::{MonitorStore, StoreError};
use crate::types::{PlayerPresenceRecord, PresenceStatus, ServerHealthRecord, StatsSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Snapshot history kept per store before the oldest entries are evicted.
const DEFAULT_MAX_SNAPSHOTS: usize = 10_000;

/// RwLock-backed implementation of [`MonitorStore`].
pub struct InMemoryStore {
    health: RwLock<HashMap<String, ServerHealthRecord>>,
    snapshots: RwLock<Vec<StatsSnapshot>>,
    presence: RwLock<HashMap<(String, String), PlayerPresenceRecord>>,
    max_snapshots: usize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            health: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(Vec::new()),
            presence: RwLock::new(HashMap::new()),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
        }
    }

    /// Latest health record for a server.
    pub fn health_of(&self, server_id: &str) -> Option<ServerHealthRecord> {
        self.health.read().ok()?.get(server_id).cloned()
    }

    /// All snapshots for a server, oldest first.
    pub fn snapshots_for(&self, server_id: &str) -> Vec<StatsSnapshot> {
        self.snapshots
            .read()
            .map(|guard| {
                guard
                    .iter()
                    .filter(|s| s.server_id == server_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Presence record for one `(server, steam id)` pair.
    pub fn presence_of(&self, server_id: &str, steam_id: &str) -> Option<PlayerPresenceRecord> {
        self.presence
            .read()
            .ok()?
            .get(&(server_id.to_string(), steam_id.to_string()))
            .cloned()
    }

    /// Steam ids currently online for a server, sorted.
    pub fn online_roster(&self, server_id: &str) -> Vec<String> {
        let mut roster: Vec<String> = self
            .presence
            .read()
            .map(|guard| {
                guard
                    .values()
                    .filter(|r| r.server_id == server_id && r.status == PresenceStatus::Online)
                    .map(|r| r.steam_id.clone())
                    .collect()
            })
            .unwrap_or_default();
        roster.sort();
        roster
    }

    /// Presence records held for a server, any status.
    pub fn presence_count(&self, server_id: &str) -> usize {
        self.presence
            .read()
            .map(|guard| guard.values().filter(|r| r.server_id == server_id).count())
            .unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MonitorStore for InMemoryStore {
    async fn update_health(&self, record: ServerHealthRecord) -> Result<(), StoreError> {
        let mut health = self
            .health
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        health.insert(record.server_id.clone(), record);
        Ok(())
    }

    async fn append_snapshot(&self, snapshot: StatsSnapshot) -> Result<(), StoreError> {
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        snapshots.push(snapshot);

        // Evict oldest if over limit
        if snapshots.len() > self.max_snapshots {
            snapshots.remove(0);
        }

        Ok(())
    }

    async fn upsert_presence(&self, record: PlayerPresenceRecord) -> Result<(), StoreError> {
        let mut presence = self
            .presence
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        presence.insert(
            (record.server_id.clone(), record.steam_id.clone()),
            record,
        );
        Ok(())
    }

    async fn mark_offline(
        &self,
        server_id: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let mut presence = self
            .presence
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        let mut flipped = Vec::new();
        for ((sid, steam_id), record) in presence.iter_mut() {
            if sid == server_id && record.status == PresenceStatus::Online {
                record.status = PresenceStatus::Offline;
                record.last_seen = seen_at;
                flipped.push(steam_id.clone());
            }
        }

        flipped.sort();
        Ok(flipped)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
