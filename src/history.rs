//! # History Tracker
//!
//! Records what the user plays, likes, skips and searches, and exposes the
//! derived [`PreferenceSnapshot`].
//!
//! ## Lifecycle
//!
//! [`HistoryTracker::open`] hydrates the event log from the key-value store
//! (missing or unreadable data starts a fresh log). [`HistoryTracker::shutdown`]
//! flushes a pending remote sync and stops the timer thread; dropping the
//! tracker does the same.
//!
//! ## Side effects of tracking
//!
//! Every `track_*` call appends one event, evicts past the sequence cap,
//! writes the whole log to the store synchronously and (re)arms the sync
//! timer. The remote sync runs once the log has been quiet for the sync
//! delay and sends the log as it is at that moment. None of this ever
//! reports an error to the caller: storage and sync failures are logged and
//! dropped, and a failed sync is not retried until the next tracking call.

use crate::clock::Clock;
use crate::collector::HistoryCollector;
use crate::debounce::Debouncer;
use crate::event_log::{Event, EventLog};
use crate::preferences::{self, HistorySummary, PreferenceSnapshot, PreferenceSource};
use crate::storage::KeyValueStore;
use crate::track::{CandidateTrack, TrackRef};
use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Key the serialized event log is stored under.
pub const HISTORY_KEY: &str = "encore_user_history";

/// Quiet period before a remote sync fires.
pub const SYNC_DELAY: Duration = Duration::from_secs(5);

/// How the sync timer is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDriver {
    /// A worker thread fires the sync after the delay.
    Background,
    /// Nothing fires on its own; call [`HistoryTracker::sync_now`].
    Manual,
}

#[derive(Debug, Clone, Copy)]
pub struct TrackerOptions {
    pub sync_delay: Duration,
    pub driver: SyncDriver,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            sync_delay: SYNC_DELAY,
            driver: SyncDriver::Background,
        }
    }
}

impl TrackerOptions {
    /// Options for deterministic tests: manual driver, default delay.
    #[must_use]
    pub fn manual() -> Self {
        Self {
            driver: SyncDriver::Manual,
            ..Self::default()
        }
    }
}

pub struct HistoryTracker {
    log: Arc<Mutex<EventLog>>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    sync: Debouncer,
}

impl std::fmt::Debug for HistoryTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryTracker")
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

impl HistoryTracker {
    /// Build a tracker, hydrating its log from `store`.
    ///
    /// # Errors
    ///
    /// Only fails when the background sync thread cannot be spawned.
    pub fn open(
        store: Arc<dyn KeyValueStore>,
        collector: Arc<dyn HistoryCollector>,
        clock: Arc<dyn Clock>,
        options: TrackerOptions,
    ) -> Result<Self> {
        let log = Arc::new(Mutex::new(load_log(store.as_ref(), clock.as_ref())));

        let task_log = Arc::clone(&log);
        let task = move || {
            let snapshot = lock(&task_log).clone();
            match collector.sync(&snapshot) {
                Ok(()) => debug!("Remote history sync completed"),
                Err(e) => warn!("Remote history sync failed: {e:#}"),
            }
        };

        let sync = match options.driver {
            SyncDriver::Background => Debouncer::spawn(options.sync_delay, task)?,
            SyncDriver::Manual => Debouncer::manual(options.sync_delay, task),
        };

        info!("History tracker ready ({:?} sync)", options.driver);
        Ok(Self {
            log,
            store,
            clock,
            sync,
        })
    }

    pub fn track_play(&self, track: &TrackRef, duration_ms: u64) {
        self.record(Event::play(track, duration_ms, self.clock.now()));
    }

    pub fn track_like(&self, track: &TrackRef) {
        self.record(Event::like(track, self.clock.now()));
    }

    pub fn track_skip(&self, track: &TrackRef, play_duration_ms: u64) {
        self.record(Event::skip(track, play_duration_ms, self.clock.now()));
    }

    pub fn track_search(&self, query: &str, results: &[CandidateTrack]) {
        self.record(Event::search(query, results, self.clock.now()));
    }

    /// Derived view of the current log. Never fails.
    #[must_use]
    pub fn user_preferences(&self) -> PreferenceSnapshot {
        PreferenceSnapshot::from_log(&lock(&self.log))
    }

    #[must_use]
    pub fn history_summary(&self) -> HistorySummary {
        preferences::history_summary(&lock(&self.log))
    }

    /// Copy of the current log.
    #[must_use]
    pub fn event_log(&self) -> EventLog {
        lock(&self.log).clone()
    }

    /// Forget everything, including the persisted copy. Irrecoverable.
    ///
    /// A pending remote sync stays armed and sends the empty log.
    pub fn clear_history(&self) {
        let mut log = lock(&self.log);
        *log = EventLog::new(self.clock.now_millis());

        // Removed under the log lock so a concurrent `record` cannot write
        // the old log back.
        if let Err(e) = self.store.remove(HISTORY_KEY) {
            error!("Failed to remove persisted history: {e:#}");
        }
        drop(log);

        if self.sync.is_pending() {
            debug!("Pending history sync will carry the cleared log");
        }
        info!("History cleared");
    }

    /// Fire a pending remote sync immediately. Returns whether one was pending.
    pub fn sync_now(&self) -> bool {
        self.sync.fire_now()
    }

    #[must_use]
    pub fn sync_pending(&self) -> bool {
        self.sync.is_pending()
    }

    /// Flush a pending sync and stop the timer thread.
    pub fn shutdown(&mut self) {
        if self.sync.fire_now() {
            debug!("Flushed pending history sync on shutdown");
        }
        self.sync.shutdown();
    }

    fn record(&self, event: Event) {
        {
            // Persist while holding the lock so stored snapshots follow the
            // in-memory order and never outlive a clear.
            let mut log = lock(&self.log);
            log.push(event);

            match serde_json::to_string(&*log) {
                Ok(json) => {
                    if let Err(e) = self.store.set(HISTORY_KEY, &json) {
                        error!("Failed to persist history: {e:#}");
                    }
                }
                Err(e) => error!("Failed to serialize history: {e}"),
            }
        }

        self.sync.schedule();
    }
}

impl PreferenceSource for HistoryTracker {
    /// Unlike [`HistoryTracker::user_preferences`], a poisoned log is an error
    /// here so the recommender can fall back to generic results.
    fn preferences(&self) -> Result<PreferenceSnapshot> {
        let log = self
            .log
            .lock()
            .map_err(|_| anyhow::anyhow!("History log lock poisoned"))?;
        Ok(PreferenceSnapshot::from_log(&log))
    }
}

impl Drop for HistoryTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock(log: &Mutex<EventLog>) -> MutexGuard<'_, EventLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read the persisted log, or start a fresh one.
fn load_log(store: &dyn KeyValueStore, clock: &dyn Clock) -> EventLog {
    let fresh = || EventLog::new(clock.now_millis());

    let raw = match store.get(HISTORY_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return fresh(),
        Err(e) => {
            error!("Failed to load history: {e:#}");
            return fresh();
        }
    };

    match serde_json::from_str::<EventLog>(&raw) {
        Ok(mut log) => {
            log.enforce_caps();
            if log.session_start == 0 {
                log.session_start = clock.now_millis();
            }
            info!(
                "Loaded history: {} plays, {} likes, {} skips, {} searches",
                log.plays.len(),
                log.likes.len(),
                log.skips.len(),
                log.searches.len()
            );
            log
        }
        Err(e) => {
            error!("Stored history is unreadable, starting fresh: {e}");
            fresh()
        }
    }
}
