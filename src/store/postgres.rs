//! Postgres-backed store and registry (feature `postgres`)
//!
//! One `PgStore` serves both seams: [`MonitorStore`] for observations and
//! [`ServerRegistry`] for the enrolled-fleet feed, since production
//! deployments keep both in the same database. Table shapes live under
//! `migrations/`.

use super::{MonitorStore, StoreError};
use crate::registry::{RegisteredServer, RegistryError, ServerRegistry};
use crate::types::{PlayerPresenceRecord, ServerHealthRecord, StatsSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// sqlx-backed implementation of the persistence and registry seams.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap a pool shared with an embedding application.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run schema migrations from the `migrations/` directory.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MonitorStore for PgStore {
    async fn update_health(&self, record: ServerHealthRecord) -> Result<(), StoreError> {
        let count = record
            .player_count
            .map(|c| i32::try_from(c).unwrap_or(i32::MAX));

        sqlx::query(
            "INSERT INTO server_health (server_id, status, last_checked_at, player_count)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (server_id) DO UPDATE SET
               status = EXCLUDED.status,
               last_checked_at = EXCLUDED.last_checked_at,
               player_count = COALESCE(EXCLUDED.player_count, server_health.player_count)",
        )
        .bind(&record.server_id)
        .bind(record.status.to_string())
        .bind(record.last_checked_at)
        .bind(count)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Database error: {e}")))?;

        Ok(())
    }

    async fn append_snapshot(&self, snapshot: StatsSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO server_stats (server_id, payload, collected_at) VALUES ($1, $2, $3)",
        )
        .bind(&snapshot.server_id)
        .bind(&snapshot.payload)
        .bind(snapshot.collected_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Database error: {e}")))?;

        Ok(())
    }

    async fn upsert_presence(&self, record: PlayerPresenceRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO server_players (server_id, steam_id, player_name, status, last_seen)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (server_id, steam_id) DO UPDATE SET
               player_name = EXCLUDED.player_name,
               status = EXCLUDED.status,
               last_seen = EXCLUDED.last_seen",
        )
        .bind(&record.server_id)
        .bind(&record.steam_id)
        .bind(&record.name)
        .bind(record.status.to_string())
        .bind(record.last_seen)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Database error: {e}")))?;

        Ok(())
    }

    async fn mark_offline(
        &self,
        server_id: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "UPDATE server_players SET status = 'offline', last_seen = $2
             WHERE server_id = $1 AND status = 'online'
             RETURNING steam_id",
        )
        .bind(server_id)
        .bind(seen_at)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Database error: {e}")))?;

        let mut ids: Vec<String> = rows.into_iter().map(|(id,)| id).collect();
        ids.sort();
        Ok(ids)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl ServerRegistry for PgStore {
    async fn active_servers(&self) -> Result<Vec<RegisteredServer>, RegistryError> {
        let rows: Vec<(String, String, i32, String)> = sqlx::query_as(
            "SELECT id, hostname, port, rcon_password FROM servers WHERE active ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RegistryError::Unavailable(format!("Database error: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(id, host, port, password)| RegisteredServer {
                id,
                host,
                port: u16::try_from(port).unwrap_or(0),
                password,
            })
            .collect())
    }

    fn registry_name(&self) -> &'static str {
        "postgres"
    }
}
