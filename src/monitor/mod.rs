//! Fleet monitoring: poll cycles, roster reconciliation, scheduling
//!
//! Architecture:
//! - [`fleet`]: one fault-isolated poll pass over every registered server
//! - [`roster`]: two-phase presence reconciliation per observed player list
//! - [`scheduler`]: cancellable cadence loop around the poll pass
//!
//! The monitor is storage- and registry-agnostic; both collaborators come in
//! as trait objects so deployments can pair the in-memory store with a JSON
//! fleet file or the Postgres adapter with a live `servers` table.

pub mod fleet;
pub mod roster;
pub mod scheduler;

pub use fleet::{CycleReport, FleetMonitor};
pub use roster::{RosterDelta, RosterReconciler};
pub use scheduler::run_polling_loop;
