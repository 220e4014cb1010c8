use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::helpers::{parse_datetime, parse_status, parse_uuid};
use super::Database;
use crate::models::Session;

const SESSION_COLUMNS: &str =
    "id, category, sub_category, start_time, elapsed_seconds, status, completed_count, active_task_id";

#[allow(clippy::cast_possible_truncation)]
fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let elapsed_seconds: f64 = row.get(4)?;
    Ok(Session {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        category: row.get(1)?,
        sub_category: row.get(2)?,
        start_time: parse_datetime(&row.get::<_, String>(3)?)?,
        elapsed: Duration::milliseconds((elapsed_seconds * 1000.0).round() as i64),
        status: parse_status(&row.get::<_, String>(5)?)?,
        completed_count: row.get(6)?,
        active_task_id: row.get(7)?,
    })
}

impl Database {
    /// Insert or replace a session snapshot keyed by its id
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn upsert_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO pomodoro_sessions
             (id, category, sub_category, start_time, elapsed_seconds, status, completed_count, active_task_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                category = excluded.category,
                sub_category = excluded.sub_category,
                start_time = excluded.start_time,
                elapsed_seconds = excluded.elapsed_seconds,
                status = excluded.status,
                completed_count = excluded.completed_count,
                active_task_id = excluded.active_task_id",
            params![
                session.id.to_string(),
                session.category,
                session.sub_category,
                session.start_time.to_rfc3339(),
                session.elapsed_seconds(),
                session.status.as_str(),
                session.completed_count,
                session.active_task_id,
            ],
        )?;
        Ok(())
    }

    /// Get a session snapshot by id
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_session(&self, id: uuid::Uuid) -> Result<Option<Session>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM pomodoro_sessions WHERE id = ?1"),
                params![id.to_string()],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    /// Get sessions whose start time falls in `[start, end)`
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_sessions(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM pomodoro_sessions
             WHERE start_time >= ?1 AND start_time < ?2
             ORDER BY start_time"
        ))?;
        let sessions = stmt
            .query_map(params![start.to_rfc3339(), end.to_rfc3339()], row_to_session)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }
}
