//! Garrison: RCON Fleet Administration
//!
//! Connection handling, administrative commands, and continuous health
//! monitoring for fleets of RCON-capable game servers.
//!
//! ## Architecture
//!
//! - **RCON Client**: Framed TCP sessions with timeout-bounded handshakes and
//!   typed admin commands (roster, kick, ban, server info, restart)
//! - **Registry**: Where the fleet comes from (static list, JSON file, or
//!   Postgres `servers` table)
//! - **Monitor**: Fault-isolated poll cycles writing health, stats snapshots,
//!   and player presence through a pluggable store
//! - **Scheduler**: Cancellable cadence loop for long-running deployments

// Fleet administration modules
pub mod config;
pub mod monitor;
pub mod rcon;
pub mod registry;
pub mod store;
pub mod types;

// Re-export deployment configuration
pub use config::MonitorConfig;

// Re-export commonly used types
pub use types::{
    CommandResult, HealthStatus, Player, PlayerPresenceRecord, PresenceStatus,
    ServerHealthRecord, StatsSnapshot,
};

// Re-export the RCON surface
pub use rcon::{
    probe, CommandError, ConnectError, ConnectionOptions, ConnectionState, DisconnectError,
    RconClient, RconConnection, ReconnectPolicy,
};

// Re-export registry components
pub use registry::{RegisteredServer, RegistryError, ServerRegistry, StaticRegistry};

// Re-export storage components
pub use store::{InMemoryStore, MonitorStore, StoreError};
#[cfg(feature = "postgres")]
pub use store::PgStore;

// Re-export the monitor
pub use monitor::{run_polling_loop, CycleReport, FleetMonitor, RosterDelta, RosterReconciler};
