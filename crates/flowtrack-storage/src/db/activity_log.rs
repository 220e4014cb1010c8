use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::helpers::{parse_datetime, parse_uuid};
use super::Database;
use crate::models::ActivityRecord;

const ACTIVITY_COLUMNS: &str = "id, timestamp, app_name, window_title, category, sub_category,
     session_id, active_task_id, activity_summary";

fn row_to_activity(row: &Row<'_>) -> rusqlite::Result<ActivityRecord> {
    Ok(ActivityRecord {
        id: Some(row.get(0)?),
        timestamp: parse_datetime(&row.get::<_, String>(1)?)?,
        app_name: row.get(2)?,
        window_title: row.get(3)?,
        category: row.get(4)?,
        sub_category: row.get(5)?,
        session_id: row
            .get::<_, Option<String>>(6)?
            .map(|s| parse_uuid(&s))
            .transpose()?,
        active_task_id: row.get(7)?,
        activity_summary: row.get(8)?,
    })
}

impl Database {
    /// Append an activity record and return its row id
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert operation fails
    pub fn append_activity(&self, record: &ActivityRecord) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO activity_logs
             (timestamp, app_name, window_title, category, sub_category, session_id, active_task_id, activity_summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.timestamp.to_rfc3339(),
                record.app_name,
                record.window_title,
                record.category,
                record.sub_category,
                record.session_id.map(|id| id.to_string()),
                record.active_task_id,
                record.activity_summary,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a single activity record by row id
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_activity(&self, id: i64) -> Result<Option<ActivityRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {ACTIVITY_COLUMNS} FROM activity_logs WHERE id = ?1"),
                params![id],
                row_to_activity,
            )
            .optional()?;
        Ok(record)
    }

    /// Get activity records in `[start, end)`, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_activities(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_logs
             WHERE timestamp >= ?1 AND timestamp < ?2
             ORDER BY timestamp, id"
        ))?;
        let records = stmt
            .query_map(
                params![start.to_rfc3339(), end.to_rfc3339()],
                row_to_activity,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Get the most recent activity records, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn recent_activities(&self, limit: usize) -> Result<Vec<ActivityRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_logs ORDER BY id DESC LIMIT ?1"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![limit], row_to_activity)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Get all activity records logged against a focus task
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_activities_by_task(&self, task_id: i64) -> Result<Vec<ActivityRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_logs
             WHERE active_task_id = ?1
             ORDER BY timestamp, id"
        ))?;
        let records = stmt
            .query_map(params![task_id], row_to_activity)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
