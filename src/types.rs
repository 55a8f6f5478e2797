//! Shared record types: command envelopes, players, health, presence
//!
//! Everything the monitor writes to a store and everything the command
//! client hands back to callers is defined here, so embedding applications
//! can depend on one module for the full data surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Command Result Envelope
// ============================================================================

/// Outcome envelope returned by every public [`RconClient`] operation.
///
/// Nothing escapes the client boundary as an error or a panic: failures are
/// folded into `success = false` with a human-readable `message`, so callers
/// (dashboards, schedulers) can branch without error-type plumbing.
///
/// [`RconClient`]: crate::rcon::RconClient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandResult<T> {
    /// Whether the operation succeeded
    pub success: bool,
    /// Human-readable outcome description
    pub message: String,
    /// Operation payload, when one exists
    pub data: Option<T>,
}

impl<T> CommandResult<T> {
    /// Successful outcome carrying a payload.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Successful outcome without a payload.
    pub fn ok_empty(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    /// Failed outcome. Never carries a payload.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    /// Rewrap a failure under a different payload type, keeping the message.
    ///
    /// Used when a raw-command failure must surface from a typed operation.
    pub fn fail_from<U>(other: &CommandResult<U>) -> Self {
        Self {
            success: false,
            message: other.message.clone(),
            data: None,
        }
    }
}

// ============================================================================
// Players
// ============================================================================

/// One row parsed from an RCON player listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    /// Server-assigned slot index, used for kick/ban targeting
    pub id: u32,
    /// Display name as reported by the server
    pub name: String,
    /// Platform identity (SteamID64 or vendor GUID)
    pub steam_id: String,
}

// ============================================================================
// Fleet Health
// ============================================================================

/// Health classification of one registered server after a poll attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Reachable and authenticated; commands were answered
    Online,
    /// The RCON session could not be established
    Offline,
    /// Session established but the check failed partway through
    Error,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Online => write!(f, "online"),
            HealthStatus::Offline => write!(f, "offline"),
            HealthStatus::Error => write!(f, "error"),
        }
    }
}

/// One health observation for one server.
///
/// The fleet monitor writes this exactly once per poll attempt per server,
/// carrying the final observed outcome of that attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerHealthRecord {
    /// Registry identifier of the observed server
    pub server_id: String,
    /// Final outcome of the poll attempt
    pub status: HealthStatus,
    /// When the attempt completed
    pub last_checked_at: DateTime<Utc>,
    /// Player slots in use; `None` when no roster could be observed this
    /// cycle (offline/error outcomes), letting stores retain the last count
    pub player_count: Option<u32>,
}

// ============================================================================
// Stats Snapshots
// ============================================================================

/// Append-only capture of a raw `serverinfo` payload.
///
/// The payload is vendor text and is stored opaquely; downstream tooling
/// decides how to interpret it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsSnapshot {
    /// Registry identifier of the sampled server
    pub server_id: String,
    /// Raw vendor payload, uninterpreted
    pub payload: String,
    /// When the sample was taken
    pub collected_at: DateTime<Utc>,
}

// ============================================================================
// Player Presence
// ============================================================================

/// Whether a player was present in the most recent roster observation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresenceStatus::Online => write!(f, "online"),
            PresenceStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Per-server player sighting, unique per `(server_id, steam_id)`.
///
/// Uniqueness is enforced by the reconciler's upsert key in the store, never
/// by client-side deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerPresenceRecord {
    /// Registry identifier of the server the player was seen on
    pub server_id: String,
    /// Platform identity, the stable half of the upsert key
    pub steam_id: String,
    /// Most recently observed display name
    pub name: String,
    /// Presence as of the last completed reconciliation
    pub status: PresenceStatus,
    /// Timestamp of the last observation that touched this record
    pub last_seen: DateTime<Utc>,
}
