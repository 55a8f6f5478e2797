//! Two-phase roster reconciliation
//!
//! Presence rows are reconciled against each freshly observed roster in two
//! phases: first every row for the server that is still marked online is
//! flipped offline, then each player in the new roster is upserted back to
//! online. Both phases share one timestamp, so a player who merely stayed
//! connected never shows a presence gap.

use crate::store::{MonitorStore, StoreError};
use crate::types::{Player, PlayerPresenceRecord, PresenceStatus};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of one reconciliation pass for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterDelta {
    /// Players online after the pass
    pub online: usize,
    /// Steam ids seen this pass that were not online before it
    pub joined: Vec<String>,
    /// Steam ids online before the pass that are absent from the new roster
    pub left: Vec<String>,
}

impl RosterDelta {
    /// True when the pass changed no player's presence.
    pub fn is_steady(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

/// Reconciles observed rosters into the presence table of a [`MonitorStore`].
pub struct RosterReconciler {
    store: Arc<dyn MonitorStore>,
}

impl RosterReconciler {
    pub fn new(store: Arc<dyn MonitorStore>) -> Self {
        Self { store }
    }

    /// Apply one observed roster for `server_id`.
    ///
    /// A store fault in either phase aborts the pass; the next successful
    /// pass repairs any rows the aborted one left marked offline.
    pub async fn reconcile(
        &self,
        server_id: &str,
        players: &[Player],
    ) -> Result<RosterDelta, StoreError> {
        let now = Utc::now();

        let previously_online: HashSet<String> =
            self.store.mark_offline(server_id, now).await?.into_iter().collect();

        for player in players {
            let record = PlayerPresenceRecord {
                server_id: server_id.to_string(),
                steam_id: player.steam_id.clone(),
                name: player.name.clone(),
                status: PresenceStatus::Online,
                last_seen: now,
            };
            self.store.upsert_presence(record).await?;
        }

        let current: HashSet<&str> = players.iter().map(|p| p.steam_id.as_str()).collect();
        let mut joined: Vec<String> = players
            .iter()
            .filter(|p| !previously_online.contains(&p.steam_id))
            .map(|p| p.steam_id.clone())
            .collect();
        joined.sort();
        joined.dedup();
        let mut left: Vec<String> = previously_online
            .into_iter()
            .filter(|steam_id| !current.contains(steam_id.as_str()))
            .collect();
        left.sort();

        let delta = RosterDelta {
            online: current.len(),
            joined,
            left,
        };
        if delta.is_steady() {
            debug!(server_id = %server_id, online = delta.online, "Roster unchanged");
        } else {
            info!(
                server_id = %server_id,
                online = delta.online,
                joined = delta.joined.len(),
                left = delta.left.len(),
                "Roster reconciled"
            );
        }
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn player(id: u32, name: &str, steam_id: &str) -> Player {
        Player {
            id,
            name: name.to_string(),
            steam_id: steam_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_pass_marks_everyone_joined() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = RosterReconciler::new(store.clone());

        let roster = vec![
            player(1, "Bob", "76561198000000001"),
            player(2, "Alice", "76561198000000002"),
        ];
        let delta = reconciler.reconcile("alpha", &roster).await.unwrap();

        assert_eq!(delta.online, 2);
        assert_eq!(
            delta.joined,
            vec![
                "76561198000000001".to_string(),
                "76561198000000002".to_string()
            ]
        );
        assert!(delta.left.is_empty());
        assert_eq!(store.online_roster("alpha").len(), 2);
    }

    #[tokio::test]
    async fn test_steady_roster_produces_no_delta() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = RosterReconciler::new(store.clone());
        let roster = vec![player(1, "Bob", "76561198000000001")];

        reconciler.reconcile("alpha", &roster).await.unwrap();
        let delta = reconciler.reconcile("alpha", &roster).await.unwrap();

        assert!(delta.is_steady());
        assert_eq!(delta.online, 1);
        assert_eq!(store.online_roster("alpha").len(), 1);
    }

    #[tokio::test]
    async fn test_departed_player_flips_offline() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = RosterReconciler::new(store.clone());

        let first = vec![
            player(1, "Bob", "76561198000000001"),
            player(2, "Alice", "76561198000000002"),
        ];
        reconciler.reconcile("alpha", &first).await.unwrap();

        let second = vec![player(2, "Alice", "76561198000000002")];
        let delta = reconciler.reconcile("alpha", &second).await.unwrap();

        assert_eq!(delta.left, vec!["76561198000000001".to_string()]);
        assert!(delta.joined.is_empty());
        let bob = store.presence_of("alpha", "76561198000000001").unwrap();
        assert_eq!(bob.status, PresenceStatus::Offline);
        let alice = store.presence_of("alpha", "76561198000000002").unwrap();
        assert_eq!(alice.status, PresenceStatus::Online);
    }

    #[tokio::test]
    async fn test_empty_roster_empties_the_server() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = RosterReconciler::new(store.clone());

        reconciler
            .reconcile("alpha", &[player(1, "Bob", "76561198000000001")])
            .await
            .unwrap();
        let delta = reconciler.reconcile("alpha", &[]).await.unwrap();

        assert_eq!(delta.online, 0);
        assert_eq!(delta.left, vec!["76561198000000001".to_string()]);
        assert!(store.online_roster("alpha").is_empty());
    }

    #[tokio::test]
    async fn test_rosters_are_isolated_per_server() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = RosterReconciler::new(store.clone());

        reconciler
            .reconcile("alpha", &[player(1, "Bob", "76561198000000001")])
            .await
            .unwrap();
        reconciler
            .reconcile("beta", &[player(1, "Carol", "76561198000000003")])
            .await
            .unwrap();

        // Emptying beta must not touch alpha's rows
        reconciler.reconcile("beta", &[]).await.unwrap();
        assert_eq!(store.online_roster("alpha").len(), 1);
        assert!(store.online_roster("beta").is_empty());
    }
}
