use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::AppState;

/// Run `scan_all` every `interval`, first after `initial_delay`. Scans carry
/// no in-process state, so this loop can run alongside client-triggered scans
/// and other server instances.
pub fn spawn_scan_loop(
    state: Arc<AppState>,
    interval: Duration,
    initial_delay: Duration,
) -> JoinHandle<()> {
    info!(
        interval_secs = interval.as_secs(),
        initial_delay_secs = initial_delay.as_secs(),
        "Starting escalation scan loop"
    );

    tokio::spawn(async move {
        tokio::time::sleep(initial_delay).await;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = state.bakery.escalation.scan_all().await {
                error!(error = %e, "Scheduled escalation scan failed");
            }
        }
    })
}
