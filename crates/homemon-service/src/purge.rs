//! Background purge of readings older than the 24-hour window.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::state::AppState;

/// Periodically deletes stale readings while `retention.auto_purge` is set.
pub struct Purger {
    state: Arc<AppState>,
}

impl Purger {
    /// Create a new purger.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Start the purge task if enabled in the configuration.
    ///
    /// Returns `None` when purging is disabled or already running. The first
    /// purge runs immediately, then once per configured interval until
    /// [`PurgeState::signal_stop`](crate::state::PurgeState::signal_stop).
    pub async fn start(&self) -> Option<JoinHandle<()>> {
        let retention = self.state.config.read().await.retention.clone();

        if !retention.auto_purge {
            info!("Automatic purge disabled");
            return None;
        }

        if self.state.purge.is_running() {
            warn!("Purge task already running");
            return None;
        }

        let period = Duration::from_secs(retention.purge_interval_secs);
        info!(
            "Starting purge task (interval: {}s)",
            retention.purge_interval_secs
        );

        self.state.purge.reset_stop();
        self.state.purge.set_running(true);

        let state = Arc::clone(&self.state);
        Some(tokio::spawn(async move {
            run_purge_loop(state, period).await;
        }))
    }
}

async fn run_purge_loop(state: Arc<AppState>, period: Duration) {
    let mut stop_rx = state.purge.subscribe_stop();
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures = 0u32;

    loop {
        tokio::select! {
            _ = timer.tick() => {}
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
        }

        match purge_once(&state).await {
            Ok(removed) => {
                consecutive_failures = 0;
                if removed > 0 {
                    info!("Purged {} stale readings", removed);
                } else {
                    debug!("No stale readings to purge");
                }
            }
            Err(e) => {
                consecutive_failures += 1;
                if consecutive_failures <= 3 {
                    warn!("Purge failed: {} (attempt {})", e, consecutive_failures);
                } else if consecutive_failures == 4 {
                    error!(
                        "Purge failed {} times in a row, will continue trying silently",
                        consecutive_failures
                    );
                }
            }
        }
    }

    state.purge.set_running(false);
    info!("Purge task stopped");
}

/// Run one purge and record the outcome in the purge statistics.
pub async fn purge_once(state: &AppState) -> homemon_store::Result<u64> {
    let result = state.purge_stale().await;
    let now = OffsetDateTime::now_utc();

    let mut stats = state.purge.stats.write().await;
    match &result {
        Ok(removed) => {
            stats.last_run_at = Some(now);
            stats.total_removed += removed;
            stats.success_count += 1;
        }
        Err(e) => {
            stats.last_error_at = Some(now);
            stats.last_error = Some(e.to_string());
            stats.failure_count += 1;
        }
    }

    result
}
