//! Pluggable persistence for monitor outputs
//!
//! Health, snapshot, and presence records leave the monitor through this
//! seam so backends can be swapped without touching poll logic:
//! - `InMemoryStore`: RwLock-backed store for tests and minimal deployments
//! - `PgStore` (feature `postgres`): sqlx-backed store for production fleets
//!
//! The monitor is stateless across cycles; everything it needs to remember
//! (which players were online, the last health verdict) lives behind this
//! trait.

use crate::types::{PlayerPresenceRecord, ServerHealthRecord, StatsSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

/// Store failures. The fleet monitor treats any of these as a fault of the
/// server being checked, never of the whole cycle.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),
}

/// Where monitor observations land.
///
/// Implementations must be thread-safe (`Send + Sync`) for shared access
/// across concurrently-checked servers.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Record the outcome of a poll attempt. Called exactly once per server
    /// per cycle, carrying the final observed status.
    async fn update_health(&self, record: ServerHealthRecord) -> Result<(), StoreError>;

    /// Append one stats snapshot. History is append-only; nothing edits it.
    async fn append_snapshot(&self, snapshot: StatsSnapshot) -> Result<(), StoreError>;

    /// Insert or replace one presence record, keyed by
    /// `(server_id, steam_id)`. The name refreshes on conflict.
    async fn upsert_presence(&self, record: PlayerPresenceRecord) -> Result<(), StoreError>;

    /// Flip every presence record currently online for `server_id` to
    /// offline with `last_seen = seen_at`. Returns the steam ids that were
    /// previously online, which the reconciler uses for delta logging.
    async fn mark_offline(
        &self,
        server_id: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError>;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;
}
