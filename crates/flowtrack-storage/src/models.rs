use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a Pomodoro session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Work interval is running
    Active,
    /// Break interval is running
    Break,
    /// Focus moved to another category; timer frozen
    Paused,
    /// Tracking ended for this session
    Completed,
}

impl SessionStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Break => "break",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    /// Whether the session clock advances in this status
    #[must_use]
    pub const fn is_timed(&self) -> bool {
        matches!(self, Self::Active | Self::Break)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "break" => Ok(Self::Break),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => anyhow::bail!("Unknown session status: {other}"),
        }
    }
}

/// A Pomodoro work/break session tied to one work category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub category: String,
    pub sub_category: String,
    pub start_time: DateTime<Utc>,
    /// Time spent in the current interval (work or break)
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    pub status: SessionStatus,
    /// Number of completed work intervals
    pub completed_count: u32,
    /// Focus task the user tagged while this session was running
    pub active_task_id: Option<i64>,
}

impl Session {
    #[must_use]
    pub fn new(category: String, sub_category: String, start_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            sub_category,
            start_time,
            elapsed: Duration::zero(),
            status: SessionStatus::Active,
            completed_count: 0,
            active_task_id: None,
        }
    }

    /// Elapsed time in fractional seconds, as persisted
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.num_milliseconds() as f64 / 1000.0
    }
}

/// One processed observation in the append-only activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Row id, assigned by the store on insert
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub app_name: String,
    pub window_title: String,
    pub category: String,
    pub sub_category: String,
    pub session_id: Option<Uuid>,
    pub active_task_id: Option<i64>,
    /// Human-readable description of what the user was doing
    pub activity_summary: String,
}

/// Focus task (todo), either created by hand or by the follow-up policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub parent_id: Option<i64>,
    pub done: bool,
    pub auto_generated: bool,
    pub created_at: DateTime<Utc>,
    pub sort_order: i64,
}

impl Todo {
    /// Manually created top-level todos act as per-category buckets
    #[must_use]
    pub fn is_bucket(&self) -> bool {
        !self.auto_generated && self.parent_id.is_none()
    }
}

mod duration_millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        i64::deserialize(deserializer).map(Duration::milliseconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_status_parse() {
        for status in [
            SessionStatus::Active,
            SessionStatus::Break,
            SessionStatus::Paused,
            SessionStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("running".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn test_only_active_and_break_are_timed() {
        assert!(SessionStatus::Active.is_timed());
        assert!(SessionStatus::Break.is_timed());
        assert!(!SessionStatus::Paused.is_timed());
        assert!(!SessionStatus::Completed.is_timed());
    }

    #[test]
    fn test_session_elapsed_serializes_as_millis() {
        let mut session = Session::new("Development".into(), "Coding".into(), Utc::now());
        session.elapsed = Duration::milliseconds(1500);
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["elapsed"], 1500);
        assert_eq!(json["status"], "active");
        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back.elapsed, Duration::milliseconds(1500));
        assert!((back.elapsed_seconds() - 1.5).abs() < f64::EPSILON);
    }
}
