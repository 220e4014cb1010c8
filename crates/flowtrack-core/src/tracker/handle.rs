use anyhow::Result;
use chrono::{DateTime, Utc};
use flowtrack_storage::{ActivityRecord, Session, SessionStatus};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::session_engine::SessionEvent;

/// Point-in-time view of the tracker for status displays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub active_session: Option<Session>,
    pub paused_sessions: Vec<Session>,
    pub completed_count: u32,
    pub pending_category: Option<String>,
    pub active_task_id: Option<i64>,
    pub enrichment_enabled: bool,
    pub last_activity: Option<ActivityRecord>,
    /// Most recent cycles, oldest first
    pub recent_cycles: Vec<CycleDecision>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// What one cycle decided, kept for tuning classification rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleDecision {
    pub at: DateTime<Utc>,
    pub app_name: String,
    pub category: String,
    pub sub_category: String,
    /// The summary came from the enricher rather than the regex label
    pub enriched: bool,
    pub session_status: Option<SessionStatus>,
    pub events: Vec<SessionEvent>,
}

/// State shared between the worker and its control handles
#[derive(Debug, Default)]
pub(crate) struct TrackerShared {
    running: AtomicBool,
    enrichment: AtomicBool,
    // An enricher is configured
    enrichment_available: AtomicBool,
    active_task: Mutex<Option<i64>>,
    status: Mutex<StatusSnapshot>,
    stop: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TrackerShared {
    pub(crate) fn new(enrichment_enabled: bool, enrichment_available: bool) -> Self {
        Self {
            enrichment: AtomicBool::new(enrichment_enabled),
            enrichment_available: AtomicBool::new(enrichment_available),
            ..Self::default()
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if !running {
            // Stores a permit if the worker is mid-cycle
            self.stop.notify_one();
        }
    }

    /// Resolves once a stop has been requested
    pub(crate) async fn stop_requested(&self) {
        self.stop.notified().await;
    }

    /// Enabled and backed by an enricher
    pub(crate) fn enrichment_enabled(&self) -> bool {
        self.enrichment.load(Ordering::SeqCst) && self.enrichment_available.load(Ordering::SeqCst)
    }

    pub(crate) fn set_enrichment_available(&self, available: bool) {
        self.enrichment_available.store(available, Ordering::SeqCst);
    }

    pub(crate) fn active_task(&self) -> Option<i64> {
        *lock(&self.active_task)
    }

    pub(crate) fn publish(&self, snapshot: StatusSnapshot) {
        *lock(&self.status) = snapshot;
    }
}

/// Cloneable control surface for a tracker running on another task
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    pub(crate) shared: Arc<TrackerShared>,
}

impl TrackerHandle {
    /// Ask the run loop to stop; it exits at its next wake-up
    pub fn stop(&self) {
        self.shared.set_running(false);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Tag subsequent activity records and the active session with a focus task
    pub fn set_active_task(&self, task_id: Option<i64>) {
        *lock(&self.shared.active_task) = task_id;
    }

    #[must_use]
    pub fn active_task(&self) -> Option<i64> {
        self.shared.active_task()
    }

    /// Toggle enrichment. Returns `false` when enabling is requested but no
    /// enricher is configured; the request is then ignored.
    pub fn set_enrichment_enabled(&self, enabled: bool) -> bool {
        if enabled && !self.shared.enrichment_available.load(Ordering::SeqCst) {
            log::warn!("Enrichment requested but no enrichment command is configured");
            return false;
        }
        self.shared.enrichment.store(enabled, Ordering::SeqCst);
        true
    }

    #[must_use]
    pub fn enrichment_enabled(&self) -> bool {
        self.shared.enrichment_enabled()
    }

    /// Latest published status, with the control flags read live
    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        let mut snapshot = lock(&self.shared.status).clone();
        snapshot.running = self.shared.is_running();
        snapshot.active_task_id = self.shared.active_task();
        snapshot.enrichment_enabled = self.shared.enrichment_enabled();
        snapshot
    }
}

/// A tracker spawned onto the runtime
#[derive(Debug)]
pub struct RunningTracker {
    pub(crate) handle: TrackerHandle,
    pub(crate) task: JoinHandle<()>,
}

impl RunningTracker {
    #[must_use]
    pub fn handle(&self) -> TrackerHandle {
        self.handle.clone()
    }

    /// Stop the tracker and wait at most `timeout` for it to finish
    ///
    /// # Errors
    ///
    /// Returns an error if the worker panicked or did not stop in time
    pub async fn shutdown(mut self, timeout: Duration) -> Result<()> {
        self.handle.stop();
        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => anyhow::bail!("Tracker task failed: {e}"),
            Err(_) => {
                self.task.abort();
                anyhow::bail!("Tracker did not stop within {timeout:?}")
            }
        }
    }
}
