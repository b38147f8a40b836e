//! Application state shared across handlers, and the operations it exposes.
//!
//! Every operation takes one snapshot from the store while holding the store
//! lock, releases the lock, and only then runs the aggregation engine.
//! Operations that depend on the clock have an `_at(now)` form so the window
//! boundary can be pinned in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::debug;

use homemon_store::ReadingStore;
use homemon_types::{
    AggregateError, NewReading, Reading, WindowStats, downsample, summarize, window_start,
};

use crate::config::Config;

/// Errors from [`AppState::stats_at`].
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error(transparent)]
    Store(#[from] homemon_store::Error),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Shared application state.
pub struct AppState {
    /// The reading store, locked for the duration of a single store call.
    pub store: Mutex<Box<dyn ReadingStore>>,
    /// Configuration.
    pub config: RwLock<Config>,
    /// Purge task control state.
    pub purge: PurgeState,
}

impl AppState {
    /// Create new application state around an already-opened store.
    pub fn new(store: impl ReadingStore + 'static, config: Config) -> Arc<Self> {
        Self::with_boxed_store(Box::new(store), config)
    }

    /// Create new application state from a boxed store.
    pub fn with_boxed_store(store: Box<dyn ReadingStore>, config: Config) -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(store),
            config: RwLock::new(config),
            purge: PurgeState::new(),
        })
    }

    /// Persist one reading and return it with its assigned id.
    pub async fn ingest(&self, reading: NewReading) -> homemon_store::Result<Reading> {
        let stored = self.store.lock().await.insert(&reading)?;
        debug!("Ingested reading {:?} at {}", stored.id, stored.timestamp);
        Ok(stored)
    }

    /// The most recent reading, or `None` when nothing is stored.
    pub async fn latest(&self) -> homemon_store::Result<Option<Reading>> {
        self.store.lock().await.find_latest()
    }

    /// The trailing 24-hour window ending at `now`, one reading per minute,
    /// in chronological order.
    pub async fn window_at(&self, now: OffsetDateTime) -> homemon_store::Result<Vec<Reading>> {
        let start = window_start(now);
        let snapshot = self.store.lock().await.find_since(start)?;
        Ok(downsample(&snapshot, start))
    }

    /// [`AppState::window_at`] for the current time.
    pub async fn window(&self) -> homemon_store::Result<Vec<Reading>> {
        self.window_at(OffsetDateTime::now_utc()).await
    }

    /// Per-metric statistics over every reading in the 24-hour window ending
    /// at `now`. No downsampling is applied.
    pub async fn stats_at(&self, now: OffsetDateTime) -> Result<WindowStats, StatsError> {
        let snapshot = self.store.lock().await.find_since(window_start(now))?;
        Ok(summarize(&snapshot)?)
    }

    /// [`AppState::stats_at`] for the current time.
    pub async fn stats(&self) -> Result<WindowStats, StatsError> {
        self.stats_at(OffsetDateTime::now_utc()).await
    }

    /// Delete readings older than the 24-hour window ending at `now`.
    ///
    /// Not linearized against concurrent inserts: a reading inserted with a
    /// timestamp just before the cutoff while this runs may survive.
    pub async fn purge_stale_at(&self, now: OffsetDateTime) -> homemon_store::Result<u64> {
        self.store.lock().await.delete_before(window_start(now))
    }

    /// [`AppState::purge_stale_at`] for the current time.
    pub async fn purge_stale(&self) -> homemon_store::Result<u64> {
        self.purge_stale_at(OffsetDateTime::now_utc()).await
    }

    /// Delete every reading.
    pub async fn purge_all(&self) -> homemon_store::Result<u64> {
        self.store.lock().await.delete_all()
    }

    /// Number of stored readings.
    pub async fn reading_count(&self) -> homemon_store::Result<u64> {
        self.store.lock().await.count()
    }
}

/// State for tracking and controlling the purge task.
pub struct PurgeState {
    /// Whether the purge task is currently running.
    running: AtomicBool,
    /// When the task was started (Unix timestamp).
    started_at: AtomicU64,
    /// Channel to signal the task to stop.
    stop_tx: watch::Sender<bool>,
    /// Receiver for stop signal (cloned by the task).
    stop_rx: watch::Receiver<bool>,
    /// Run statistics.
    pub stats: RwLock<PurgeStats>,
}

impl PurgeState {
    /// Create a new purge state.
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            running: AtomicBool::new(false),
            started_at: AtomicU64::new(0),
            stop_tx,
            stop_rx,
            stats: RwLock::new(PurgeStats::default()),
        }
    }

    /// Check if the purge task is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the task as started or stopped.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if running {
            let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
            self.started_at.store(now, Ordering::SeqCst);
        }
    }

    /// Get the task start time.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        let ts = self.started_at.load(Ordering::SeqCst);
        if ts == 0 {
            None
        } else {
            OffsetDateTime::from_unix_timestamp(ts as i64).ok()
        }
    }

    /// Get a receiver for the stop signal.
    pub fn subscribe_stop(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }

    /// Signal the task to stop.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Reset the stop signal (for restarting).
    pub fn reset_stop(&self) {
        let _ = self.stop_tx.send(false);
    }
}

impl Default for PurgeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Purge task statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PurgeStats {
    /// Time of the last successful purge.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_run_at: Option<OffsetDateTime>,
    /// Time of the last failed purge.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
    /// Last error message.
    pub last_error: Option<String>,
    /// Readings removed across all runs.
    pub total_removed: u64,
    /// Successful runs.
    pub success_count: u64,
    /// Failed runs.
    pub failure_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use homemon_store::MockStore;
    use time::Duration;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-02 12:00 UTC);

    fn reading(offset: Duration, temperature: f64) -> NewReading {
        NewReading::new(NOW + offset, temperature, 40.0, 10.0)
    }

    fn state_with(readings: Vec<NewReading>) -> Arc<AppState> {
        AppState::new(MockStore::with_readings(readings), Config::default())
    }

    #[tokio::test]
    async fn test_ingest_then_latest() {
        let state = state_with(vec![]);

        assert!(state.latest().await.unwrap().is_none());

        let stored = state.ingest(reading(Duration::ZERO, 21.0)).await.unwrap();
        assert!(stored.id.is_some());

        let latest = state.latest().await.unwrap().unwrap();
        assert_eq!(latest, stored);
    }

    #[tokio::test]
    async fn test_latest_is_by_timestamp() {
        let state = state_with(vec![
            reading(Duration::ZERO, 22.0),
            reading(-Duration::hours(1), 18.0),
        ]);

        let latest = state.latest().await.unwrap().unwrap();
        assert_eq!(latest.temperature, 22.0);
    }

    #[tokio::test]
    async fn test_window_downsamples_and_sorts() {
        let state = state_with(vec![
            reading(-Duration::minutes(1), 2.0),
            reading(-Duration::minutes(3), 0.0),
            reading(-Duration::minutes(3) + Duration::seconds(30), 0.5),
            reading(-Duration::minutes(2), 1.0),
            reading(-Duration::hours(25), 9.0),
        ]);

        let window = state.window_at(NOW).await.unwrap();
        let temps: Vec<f64> = window.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![0.0, 1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_window_includes_exact_boundary() {
        let state = state_with(vec![reading(-Duration::hours(24), 5.0)]);

        let window = state.window_at(NOW).await.unwrap();
        assert_eq!(window.len(), 1);
    }

    #[tokio::test]
    async fn test_stats_use_every_reading_in_window() {
        // Same minute: downsampling would keep only the first
        let state = state_with(vec![
            reading(-Duration::seconds(50), 20.0),
            reading(-Duration::seconds(40), 30.0),
            reading(-Duration::hours(30), 100.0),
        ]);

        let stats = state.stats_at(NOW).await.unwrap();
        assert_eq!(stats.temperature.mean, 25.0);
        assert_eq!(stats.temperature.max, 30.0);
        assert_eq!(stats.temperature.range, 10.0);
    }

    #[tokio::test]
    async fn test_stats_empty_window() {
        let state = state_with(vec![reading(-Duration::hours(48), 20.0)]);

        let result = state.stats_at(NOW).await;
        assert!(matches!(
            result,
            Err(StatsError::Aggregate(AggregateError::EmptyWindow))
        ));
    }

    #[tokio::test]
    async fn test_purge_stale_keeps_window() {
        let state = state_with(vec![
            reading(-Duration::hours(30), 1.0),
            reading(-Duration::hours(24) - Duration::seconds(1), 2.0),
            reading(-Duration::hours(24), 3.0),
            reading(Duration::ZERO, 4.0),
        ]);

        assert_eq!(state.purge_stale_at(NOW).await.unwrap(), 2);
        assert_eq!(state.reading_count().await.unwrap(), 2);
        assert_eq!(state.purge_stale_at(NOW).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_all_on_empty_store() {
        let state = state_with(vec![]);
        assert_eq!(state.purge_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let state = AppState::new(MockStore::unavailable("disk gone"), Config::default());

        assert!(matches!(
            state.ingest(reading(Duration::ZERO, 1.0)).await,
            Err(homemon_store::Error::Unavailable(_))
        ));
        assert!(state.latest().await.is_err());
        assert!(state.window_at(NOW).await.is_err());
        assert!(matches!(
            state.stats_at(NOW).await,
            Err(StatsError::Store(_))
        ));
        assert!(state.purge_all().await.is_err());
    }

    #[tokio::test]
    async fn test_ingest_rejects_timestamp_outside_utc_range() {
        let state = state_with(vec![]);
        let edge = NewReading::new(datetime!(9999-12-31 23:00 -5), 20.0, 40.0, 10.0);

        assert!(matches!(
            state.ingest(edge).await,
            Err(homemon_store::Error::InvalidTimestamp(_))
        ));
        assert_eq!(state.reading_count().await.unwrap(), 0);

        // The store lock is released and the next ingest goes through
        state.ingest(reading(Duration::ZERO, 21.0)).await.unwrap();
        assert_eq!(state.reading_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_works_over_sqlite_store() {
        let store = homemon_store::Store::open_in_memory().unwrap();
        let state = AppState::new(store, Config::default());

        state.ingest(reading(-Duration::minutes(2), 20.0)).await.unwrap();
        state.ingest(reading(-Duration::minutes(1), 22.0)).await.unwrap();

        let stats = state.stats_at(NOW).await.unwrap();
        assert_eq!(stats.temperature.mean, 21.0);
        assert_eq!(state.window_at(NOW).await.unwrap().len(), 2);
    }

    #[test]
    fn test_purge_state_lifecycle() {
        let purge = PurgeState::new();
        assert!(!purge.is_running());
        assert!(purge.started_at().is_none());

        purge.set_running(true);
        assert!(purge.is_running());
        assert!(purge.started_at().is_some());

        let rx = purge.subscribe_stop();
        purge.signal_stop();
        assert!(!purge.is_running());
        assert!(*rx.borrow());

        purge.reset_stop();
        assert!(!*rx.borrow());
    }
}
