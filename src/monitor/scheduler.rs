//! Poll-cycle cadence
//!
//! Long-running deployments drive the monitor from [`run_polling_loop`]: run
//! a cycle, log the report, sleep the interval plus a uniform random jitter,
//! repeat until the token is cancelled. Jitter keeps a restarted monitor
//! from pinning every server in the fleet on the same beat.

use crate::monitor::fleet::FleetMonitor;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run poll cycles until `cancel` fires.
///
/// Cancellation is prompt: it is honored between cycles and interrupts the
/// inter-cycle sleep. A cycle already in flight runs to completion.
pub async fn run_polling_loop(
    monitor: Arc<FleetMonitor>,
    interval: Duration,
    jitter: Duration,
    cancel: CancellationToken,
) {
    info!(
        interval_ms = interval.as_millis() as u64,
        jitter_ms = jitter.as_millis() as u64,
        "Polling loop started"
    );
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let report = monitor.run_cycle().await;
        info!(summary = %report, "Poll cycle report");

        let pause = interval + random_jitter(jitter);
        tokio::select! {
            () = cancel.cancelled() => break,
            () = sleep(pause) => {}
        }
    }
    info!("Polling loop stopped");
}

/// Uniform random duration in `[0, cap]`.
fn random_jitter(cap: Duration) -> Duration {
    if cap.is_zero() {
        return Duration::ZERO;
    }
    let cap_ms = u64::try_from(cap.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::thread_rng().gen_range(0..=cap_ms))
}
