use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Row};

use super::helpers::parse_datetime;
use super::Database;
use crate::models::Todo;

const TODO_COLUMNS: &str =
    "id, title, category, parent_id, done, auto_generated, created_at, sort_order";

fn row_to_todo(row: &Row<'_>) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: row.get(0)?,
        title: row.get(1)?,
        category: row.get(2)?,
        parent_id: row.get(3)?,
        done: row.get::<_, i32>(4)? != 0,
        auto_generated: row.get::<_, i32>(5)? != 0,
        created_at: parse_datetime(&row.get::<_, String>(6)?)?,
        sort_order: row.get(7)?,
    })
}

impl Database {
    /// Create a todo and return its id
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert operation fails
    pub fn add_todo(
        &self,
        title: &str,
        category: &str,
        auto: bool,
        parent_id: Option<i64>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO focus_tasks (title, category, done, auto_generated, parent_id, created_at, sort_order)
             VALUES (?1, ?2, 0, ?3, ?4, ?5, 0)",
            params![
                title,
                category,
                i32::from(auto),
                parent_id,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// List todos, optionally including finished ones
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_todos(&self, include_done: bool) -> Result<Vec<Todo>> {
        let conn = self.conn()?;
        let sql = if include_done {
            format!("SELECT {TODO_COLUMNS} FROM focus_tasks ORDER BY sort_order, done, id DESC")
        } else {
            format!(
                "SELECT {TODO_COLUMNS} FROM focus_tasks WHERE done = 0 ORDER BY sort_order, id DESC"
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let todos = stmt
            .query_map([], row_to_todo)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(todos)
    }

    /// Flip the done flag of a todo
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn toggle_todo(&self, todo_id: i64) -> Result<()> {
        self.conn()?.execute(
            "UPDATE focus_tasks SET done = CASE WHEN done = 0 THEN 1 ELSE 0 END WHERE id = ?1",
            params![todo_id],
        )?;
        Ok(())
    }

    /// Delete a todo and its children
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub fn delete_todo(&self, todo_id: i64) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM focus_tasks WHERE id = ?1", params![todo_id])?;
        Ok(())
    }
}
