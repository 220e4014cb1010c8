//! Pomodoro session engine.
//!
//! Turns a stream of classified focus observations into one running work/break
//! timer. Category switches are debounced so that brief focus flicker (alt-tab,
//! dialogs, a quick lookup in another app) does not fragment sessions, and a
//! session left behind is paused under its category so returning to it resumes
//! the same timer.


use chrono::{DateTime, Duration, Utc};
use flowtrack_storage::{Session, SessionStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{checked_seconds, ConfigError, PomodoroConfig};

/// State changes reported by [`SessionEngine::on_activity`] and [`SessionEngine::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted,
    SessionResumed,
    SessionPaused,
    ContextSwitchPending,
    SwitchCancelled,
    WorkCompleted,
    BreakStarted,
    BreakCompleted,
    WorkStarted,
}

impl SessionEvent {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::SessionResumed => "session_resumed",
            Self::SessionPaused => "session_paused",
            Self::ContextSwitchPending => "context_switch_pending",
            Self::SwitchCancelled => "switch_cancelled",
            Self::WorkCompleted => "work_completed",
            Self::BreakStarted => "break_started",
            Self::BreakCompleted => "break_completed",
            Self::WorkStarted => "work_started",
        }
    }
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A category change that has been seen but not yet confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSwitch {
    pub category: String,
    pub sub_category: String,
    pub detected_at: DateTime<Utc>,
}

/// Validated interval lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub debounce: Duration,
    pub work: Duration,
    pub short_break: Duration,
    pub long_break: Duration,
    pub long_break_every: u32,
}

impl Timing {
    /// Build from config, rejecting unusable values
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any duration is zero or too large, or `long_break_every` is zero
    pub fn from_config(config: &PomodoroConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            debounce: checked_seconds(config.debounce_seconds, 1, "pomodoro.debounce_seconds")?,
            work: checked_seconds(config.work_minutes, 60, "pomodoro.work_minutes")?,
            short_break: checked_seconds(
                config.short_break_minutes,
                60,
                "pomodoro.short_break_minutes",
            )?,
            long_break: checked_seconds(
                config.long_break_minutes,
                60,
                "pomodoro.long_break_minutes",
            )?,
            long_break_every: config.long_break_every,
        })
    }

    /// Long break after every `long_break_every`-th completed interval, short otherwise
    #[must_use]
    pub fn break_duration(&self, completed_count: u32) -> Duration {
        if completed_count > 0 && completed_count % self.long_break_every == 0 {
            self.long_break
        } else {
            self.short_break
        }
    }
}

/// A paused session and the interval kind to resume it in
#[derive(Debug, Clone)]
struct Paused {
    session: Session,
    resume_as: SessionStatus,
}

/// Single-writer Pomodoro state machine
#[derive(Debug)]
pub struct SessionEngine {
    timing: Timing,
    active: Option<Session>,
    paused: HashMap<String, Paused>,
    pending: Option<PendingSwitch>,
    last_tick: Option<DateTime<Utc>>,
    active_task_id: Option<i64>,
}

impl SessionEngine {
    /// Create an engine with validated timing
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the pomodoro settings are invalid
    pub fn new(config: &PomodoroConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            timing: Timing::from_config(config)?,
            active: None,
            paused: HashMap::new(),
            pending: None,
            last_tick: None,
            active_task_id: None,
        })
    }

    #[must_use]
    pub const fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Break length after `completed_count` finished work intervals
    #[must_use]
    pub fn break_duration(&self, completed_count: u32) -> Duration {
        self.timing.break_duration(completed_count)
    }

    /// The session currently timing work or a break
    #[must_use]
    pub const fn active_session(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    /// Paused sessions, ordered by category
    #[must_use]
    pub fn paused_sessions(&self) -> Vec<&Session> {
        let mut sessions = self.paused.values().map(|p| &p.session).collect::<Vec<_>>();
        sessions.sort_by(|a, b| a.category.cmp(&b.category));
        sessions
    }

    #[must_use]
    pub fn paused_session(&self, category: &str) -> Option<&Session> {
        self.paused.get(category).map(|p| &p.session)
    }

    /// Completed work intervals of the active session
    #[must_use]
    pub fn completed_count(&self) -> u32 {
        self.active.as_ref().map_or(0, |s| s.completed_count)
    }

    #[must_use]
    pub const fn pending_switch(&self) -> Option<&PendingSwitch> {
        self.pending.as_ref()
    }

    #[must_use]
    pub const fn last_tick_time(&self) -> Option<DateTime<Utc>> {
        self.last_tick
    }

    #[must_use]
    pub const fn active_task_id(&self) -> Option<i64> {
        self.active_task_id
    }

    /// Tag subsequent sessions with a focus task; the active session picks it up immediately
    pub fn set_active_task(&mut self, task_id: Option<i64>) {
        self.active_task_id = task_id;
        if let Some(session) = self.active.as_mut() {
            session.active_task_id = task_id;
        }
    }

    /// Feed one classified observation
    pub fn on_activity(
        &mut self,
        category: &str,
        sub_category: &str,
        at: DateTime<Utc>,
    ) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        let Some(current_category) = self.active.as_ref().map(|s| s.category.clone()) else {
            events.push(self.start_or_resume(category, sub_category, at));
            self.pending = None;
            return events;
        };

        if category == current_category {
            // Back on the active category before the debounce expired
            if self.pending.take().is_some() {
                log::debug!("Switch away from '{category}' cancelled");
                events.push(SessionEvent::SwitchCancelled);
            }
            return events;
        }

        match &self.pending {
            Some(pending) if pending.category == category => {
                if at - pending.detected_at >= self.timing.debounce {
                    self.execute_switch(category, sub_category, at, &mut events);
                }
            }
            _ => {
                log::debug!("Context switch '{current_category}' -> '{category}' pending");
                self.pending = Some(PendingSwitch {
                    category: category.to_string(),
                    sub_category: sub_category.to_string(),
                    detected_at: at,
                });
                events.push(SessionEvent::ContextSwitchPending);
            }
        }

        events
    }

    /// Advance the timer and cycle work/break intervals.
    ///
    /// Every interval boundary crossed since the last tick completes here, so a
    /// long gap (sleep, suspend) catches up in one call.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.active.is_none() {
            self.last_tick = Some(now);
            return events;
        }

        self.accrue(now);

        let timing = self.timing;
        let Some(session) = self.active.as_mut() else {
            return events;
        };
        loop {
            match session.status {
                SessionStatus::Active if session.elapsed >= timing.work => {
                    session.completed_count += 1;
                    session.status = SessionStatus::Break;
                    session.elapsed -= timing.work;
                    log::info!(
                        "Work interval {} completed for '{}'",
                        session.completed_count,
                        session.category
                    );
                    events.push(SessionEvent::WorkCompleted);
                    events.push(SessionEvent::BreakStarted);
                }
                SessionStatus::Break => {
                    let break_duration = timing.break_duration(session.completed_count);
                    if session.elapsed < break_duration {
                        break;
                    }
                    session.status = SessionStatus::Active;
                    session.elapsed -= break_duration;
                    log::info!("Break over for '{}', back to work", session.category);
                    events.push(SessionEvent::BreakCompleted);
                    events.push(SessionEvent::WorkStarted);
                }
                _ => break,
            }
        }

        events
    }

    /// Move the clock to `now` without crediting the active session.
    /// Used while the user is away so idle time never counts as work or break.
    pub fn skip_until(&mut self, now: DateTime<Utc>) {
        self.last_tick = Some(self.last_tick.map_or(now, |last| last.max(now)));
    }

    /// Mark every tracked session completed and hand them back for a final write
    pub fn complete_all(&mut self, now: DateTime<Utc>) -> Vec<Session> {
        self.accrue(now);
        self.pending = None;

        let mut finished = Vec::with_capacity(self.paused.len() + 1);
        if let Some(mut session) = self.active.take() {
            session.status = SessionStatus::Completed;
            finished.push(session);
        }
        for (_, paused) in self.paused.drain() {
            let mut session = paused.session;
            session.status = SessionStatus::Completed;
            finished.push(session);
        }
        finished
    }

    /// Credit the active session with wall-clock time up to `now`.
    /// Out-of-order timestamps add nothing and never move the clock backwards.
    fn accrue(&mut self, now: DateTime<Utc>) {
        if let (Some(session), Some(last)) = (self.active.as_mut(), self.last_tick) {
            if session.status.is_timed() && now > last {
                session.elapsed += now - last;
            }
        }
        self.last_tick = Some(self.last_tick.map_or(now, |last| last.max(now)));
    }

    fn execute_switch(
        &mut self,
        category: &str,
        sub_category: &str,
        at: DateTime<Utc>,
        events: &mut Vec<SessionEvent>,
    ) {
        self.accrue(at);
        if let Some(mut session) = self.active.take() {
            let resume_as = session.status;
            session.status = SessionStatus::Paused;
            log::info!(
                "Paused '{}' session {} ({}s elapsed)",
                session.category,
                session.id,
                session.elapsed.num_seconds()
            );
            self.paused
                .insert(session.category.clone(), Paused { session, resume_as });
            events.push(SessionEvent::SessionPaused);
        }
        events.push(self.start_or_resume(category, sub_category, at));
        self.pending = None;
    }

    fn start_or_resume(
        &mut self,
        category: &str,
        sub_category: &str,
        at: DateTime<Utc>,
    ) -> SessionEvent {
        self.last_tick = Some(at);

        if let Some(Paused {
            mut session,
            resume_as,
        }) = self.paused.remove(category)
        {
            session.status = resume_as;
            session.active_task_id = self.active_task_id;
            log::info!("Resumed '{category}' session {}", session.id);
            self.active = Some(session);
            return SessionEvent::SessionResumed;
        }

        let mut session = Session::new(category.to_string(), sub_category.to_string(), at);
        session.active_task_id = self.active_task_id;
        log::info!("Started '{category}' session {}", session.id);
        self.active = Some(session);
        SessionEvent::SessionStarted
    }
}
