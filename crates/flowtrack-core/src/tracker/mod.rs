//! The tracking loop: sense, classify, update the session engine, persist.

mod handle;

pub use handle::{CycleDecision, RunningTracker, StatusSnapshot, TrackerHandle};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flowtrack_storage::ActivityRecord;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use crate::classifier::Classifier;
use crate::config::{Config, DriveMode, TrackerSettings};
use crate::context_analyzer::ContextAnalyzer;
use crate::enrichment::Enrichment;
use crate::monitor::{ChangeWatcher, FocusChange, Observation, WindowSource};
use crate::session_engine::{SessionEngine, SessionEvent};
use crate::store::ActivityStore;
use crate::todo_policy::TodoPolicy;
use handle::TrackerShared;

/// Result of one tracking cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// An activity record was appended
    Recorded {
        record_id: i64,
        events: Vec<SessionEvent>,
    },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The window source failed; the next cycle retries
    SourceError,
    /// Nothing usable had focus
    NoObservation,
    /// The user was idle; the timer was held
    Idle,
}

/// Cycle decisions kept for status displays
const RECENT_CYCLES: usize = 20;

pub struct Tracker {
    source: Arc<dyn WindowSource>,
    store: Arc<dyn ActivityStore>,
    classifier: Classifier,
    analyzer: ContextAnalyzer,
    engine: SessionEngine,
    todo_policy: TodoPolicy,
    enrichment: Option<Enrichment>,
    settings: TrackerSettings,
    shared: Arc<TrackerShared>,
    last_activity: Option<ActivityRecord>,
    recent: VecDeque<CycleDecision>,
}

impl Tracker {
    /// Build a tracker from validated configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the enrichment command is unusable
    pub fn new(
        config: &Config,
        source: Arc<dyn WindowSource>,
        store: Arc<dyn ActivityStore>,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let engine = SessionEngine::new(&config.pomodoro)?;
        let enrichment = Enrichment::from_settings(&config.enrichment)?;

        Ok(Self {
            source,
            store,
            classifier: Classifier::new(&config.classification_rules),
            analyzer: ContextAnalyzer::new(&config.context_rules),
            engine,
            todo_policy: TodoPolicy::new(config.todos.auto_create),
            settings: config.tracker.clone(),
            shared: Arc::new(TrackerShared::new(
                config.enrichment.enabled,
                enrichment.is_some(),
            )),
            enrichment,
            last_activity: None,
            recent: VecDeque::with_capacity(RECENT_CYCLES),
        })
    }

    /// Replace the enricher built from configuration
    #[must_use]
    pub fn with_enrichment(mut self, enrichment: Enrichment) -> Self {
        self.enrichment = Some(enrichment);
        self.shared.set_enrichment_available(true);
        self
    }

    #[must_use]
    pub fn handle(&self) -> TrackerHandle {
        TrackerHandle {
            shared: self.shared.clone(),
        }
    }

    #[must_use]
    pub const fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    /// Run on a background task until stopped
    #[must_use]
    pub fn spawn(mut self) -> RunningTracker {
        let handle = self.handle();
        self.shared.set_running(true);
        let task = tokio::spawn(async move { self.drive().await });
        RunningTracker { handle, task }
    }

    /// Run on the current task until [`TrackerHandle::stop`] is called
    pub async fn run(&mut self) {
        self.shared.set_running(true);
        self.drive().await;
    }

    async fn drive(&mut self) {
        let mut watcher = None;
        let changes = match self.settings.mode {
            DriveMode::Poll => None,
            DriveMode::Auto => self.source.subscribe(),
            DriveMode::Event => self.source.subscribe().or_else(|| {
                let (rx, task) = ChangeWatcher::new(
                    self.source.clone(),
                    self.settings.title_check_interval(),
                )
                .spawn();
                watcher = Some(task);
                Some(rx)
            }),
        };

        match changes {
            Some(changes) => {
                log::info!("Tracker started (event-driven)");
                self.event_loop(changes).await;
                if self.shared.is_running() {
                    log::warn!("Focus listener closed; falling back to polling");
                    self.poll_loop().await;
                }
            }
            None => {
                log::info!(
                    "Tracker started (polling every {}s)",
                    self.settings.poll_interval_seconds
                );
                self.poll_loop().await;
            }
        }

        if let Some(task) = watcher {
            task.abort();
        }
        self.finish(Utc::now());
    }

    async fn poll_loop(&mut self) {
        let shared = self.shared.clone();
        let mut ticker = interval(self.settings.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while shared.is_running() {
            tokio::select! {
                _ = ticker.tick() => {}
                () = shared.stop_requested() => continue,
            }
            if !shared.is_running() {
                break;
            }
            let result = self.poll_pass(Utc::now()).await;
            log_cycle(result);
        }
    }

    /// Returns when stopped or when the listener channel closes
    async fn event_loop(&mut self, mut changes: mpsc::Receiver<FocusChange>) {
        let shared = self.shared.clone();
        let mut ticker = interval(self.settings.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        while shared.is_running() {
            tokio::select! {
                change = changes.recv() => {
                    let Some(FocusChange { observation, at }) = change else {
                        return;
                    };
                    let result = self.run_cycle(observation, at).await;
                    log_cycle(result);
                }
                _ = ticker.tick() => self.tick_pass(Utc::now()).await,
                () = shared.stop_requested() => {}
            }
        }
    }

    /// Idle check, then a full cycle. While idle the session clock is held
    /// so time away is never credited.
    async fn poll_pass(&mut self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        if self.user_idle().await {
            log::debug!("User is idle; skipping cycle");
            self.engine.skip_until(now);
            return Ok(CycleOutcome::Skipped(SkipReason::Idle));
        }
        self.poll_once(now).await
    }

    /// Fetch one observation and run a cycle on it
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the activity record or session snapshot
    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let observation = match self.source.get_observation().await {
            Ok(Some(observation)) => observation,
            Ok(None) => {
                log::debug!("No focused window; skipping cycle");
                return Ok(CycleOutcome::Skipped(SkipReason::NoObservation));
            }
            Err(e) => {
                log::warn!("Failed to read focused window: {e:#}");
                return Ok(CycleOutcome::Skipped(SkipReason::SourceError));
            }
        };
        self.run_cycle(observation, now).await
    }

    /// Classify an observation, feed the session engine and persist the result
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the activity record or session snapshot
    pub async fn run_cycle(
        &mut self,
        observation: Observation,
        now: DateTime<Utc>,
    ) -> Result<CycleOutcome> {
        let category = self
            .classifier
            .classify(&observation.app_name, &observation.window_title);
        let context =
            self.analyzer
                .analyze(&observation.app_name, &observation.window_title, &category);
        let enriched = self.enriched_summary(&observation).await;
        let was_enriched = enriched.is_some();
        let summary = enriched.unwrap_or(context.label);

        let task_id = self.shared.active_task();
        self.engine.set_active_task(task_id);
        let previous = self.engine.active_session().map(|s| s.category.clone());
        let mut events = self
            .engine
            .on_activity(&category, &context.sub_category, now);
        events.extend(self.engine.tick(now));

        let mut record = ActivityRecord {
            id: None,
            timestamp: now,
            app_name: observation.app_name,
            window_title: observation.window_title,
            category,
            sub_category: context.sub_category,
            session_id: self.engine.active_session().map(|s| s.id),
            active_task_id: task_id,
            activity_summary: summary,
        };
        let record_id = self
            .store
            .append_activity(&record)
            .context("Failed to append activity")?;
        record.id = Some(record_id);

        self.save_sessions(previous.as_deref(), &events)?;

        self.todo_policy
            .maybe_create(&record.category, &record.sub_category, &*self.store);

        self.remember(CycleDecision {
            at: now,
            app_name: record.app_name.clone(),
            category: record.category.clone(),
            sub_category: record.sub_category.clone(),
            enriched: was_enriched,
            session_status: self.engine.active_session().map(|s| s.status),
            events: events.clone(),
        });
        self.last_activity = Some(record);
        self.publish_status(now);
        Ok(CycleOutcome::Recorded { record_id, events })
    }

    /// Upsert the active session, plus the one just paused when a switch happened
    fn save_sessions(&self, previous: Option<&str>, events: &[SessionEvent]) -> Result<()> {
        if let Some(session) = self.engine.active_session() {
            self.store
                .upsert_session(session)
                .context("Failed to save active session")?;
        }
        if events.contains(&SessionEvent::SessionPaused) {
            let paused = previous.and_then(|category| self.engine.paused_session(category));
            if let Some(paused) = paused {
                self.store
                    .upsert_session(paused)
                    .context("Failed to save paused session")?;
            }
        }
        Ok(())
    }

    fn remember(&mut self, decision: CycleDecision) {
        log::debug!(
            "Cycle: {} -> {} / {} (enriched: {}, session: {:?}, events: [{}])",
            decision.app_name,
            decision.category,
            decision.sub_category,
            decision.enriched,
            decision.session_status,
            join_events(&decision.events)
        );
        if self.recent.len() == RECENT_CYCLES {
            self.recent.pop_front();
        }
        self.recent.push_back(decision);
    }

    /// Timer-only pass for event-driven mode: advances the Pomodoro clock while
    /// focus stays put. The last observed context is replayed so a pending
    /// switch confirms once its debounce expires. Store failures here are
    /// logged and dropped.
    async fn tick_pass(&mut self, now: DateTime<Utc>) {
        if self.user_idle().await {
            log::debug!("User is idle; skipping tick");
            self.engine.skip_until(now);
            return;
        }

        let task_id = self.shared.active_task();
        self.engine.set_active_task(task_id);
        let previous = self.engine.active_session().map(|s| s.category.clone());
        let mut events = match &self.last_activity {
            Some(last) => self
                .engine
                .on_activity(&last.category, &last.sub_category, now),
            None => Vec::new(),
        };
        events.extend(self.engine.tick(now));
        if !events.is_empty() {
            log::debug!("Tick events: {}", join_events(&events));
        }

        let session_id = self.engine.active_session().map(|s| s.id);
        if let Some(last) = self.last_activity.as_mut() {
            let mut record = last.clone();
            record.id = None;
            record.timestamp = now;
            record.session_id = session_id;
            record.active_task_id = task_id;
            match self.store.append_activity(&record) {
                Ok(id) => {
                    record.id = Some(id);
                    *last = record;
                }
                Err(e) => log::warn!("Dropped activity re-persist: {e:#}"),
            }
        }
        if let Err(e) = self.save_sessions(previous.as_deref(), &events) {
            log::warn!("Dropped session re-persist: {e:#}");
        }

        self.publish_status(now);
    }

    /// Idle-check failures count as activity so tracking never silently stops
    async fn user_idle(&self) -> bool {
        match self.source.is_idle().await {
            Ok(idle) => idle,
            Err(e) => {
                log::warn!("Failed to check idle state; assuming not idle: {e:#}");
                false
            }
        }
    }

    /// Enrichment summary when enabled and available
    async fn enriched_summary(&mut self, observation: &Observation) -> Option<String> {
        if !self.shared.enrichment_enabled() {
            return None;
        }
        self.enrichment
            .as_mut()?
            .summary(observation, std::time::Instant::now())
            .await
    }

    /// Complete every session and write the final snapshots
    fn finish(&mut self, now: DateTime<Utc>) {
        for session in self.engine.complete_all(now) {
            if let Err(e) = self.store.upsert_session(&session) {
                log::error!("Failed to save final state of session {}: {e:#}", session.id);
            }
        }
        self.shared.set_running(false);
        self.publish_status(now);
        log::info!("Tracker stopped");
    }

    fn publish_status(&self, now: DateTime<Utc>) {
        self.shared.publish(StatusSnapshot {
            running: self.shared.is_running(),
            active_session: self.engine.active_session().cloned(),
            paused_sessions: self
                .engine
                .paused_sessions()
                .into_iter()
                .cloned()
                .collect(),
            completed_count: self.engine.completed_count(),
            pending_category: self.engine.pending_switch().map(|p| p.category.clone()),
            active_task_id: self.shared.active_task(),
            enrichment_enabled: self.shared.enrichment_enabled(),
            last_activity: self.last_activity.clone(),
            recent_cycles: self.recent.iter().cloned().collect(),
            updated_at: Some(now),
        });
    }
}

fn join_events(events: &[SessionEvent]) -> String {
    events
        .iter()
        .map(SessionEvent::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn log_cycle(result: Result<CycleOutcome>) {
    match result {
        Ok(CycleOutcome::Recorded { record_id, events }) => {
            if events.is_empty() {
                log::debug!("Recorded activity {record_id}");
            } else {
                log::debug!("Recorded activity {record_id} ({})", join_events(&events));
            }
        }
        Ok(CycleOutcome::Skipped(_)) => {}
        Err(e) => log::error!("Tracking cycle failed: {e:#}"),
    }
}
