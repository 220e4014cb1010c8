use anyhow::Result;
use rusqlite::Connection;

/// Initialize database schema
///
/// # Errors
///
/// Returns an error if database table creation or index creation fails
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    // Activity log - one row per processed observation, append-only
    conn.execute(
        "CREATE TABLE IF NOT EXISTS activity_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            app_name TEXT NOT NULL,
            window_title TEXT NOT NULL,
            category TEXT NOT NULL,
            sub_category TEXT NOT NULL DEFAULT '',
            session_id TEXT
        )",
        [],
    )?;

    // Pomodoro sessions - keyed snapshot, upserted on every cycle
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pomodoro_sessions (
            id TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            sub_category TEXT NOT NULL DEFAULT '',
            start_time TEXT NOT NULL,
            elapsed_seconds REAL NOT NULL,
            status TEXT NOT NULL,
            completed_count INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // Focus tasks - manual buckets and auto-generated follow-up items
    conn.execute(
        "CREATE TABLE IF NOT EXISTS focus_tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '',
            parent_id INTEGER,
            done INTEGER NOT NULL DEFAULT 0,
            auto_generated INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (parent_id) REFERENCES focus_tasks(id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Columns added after the first schema version
    let columns_to_add = [
        ("activity_logs", "active_task_id", "INTEGER"),
        ("activity_logs", "activity_summary", "TEXT NOT NULL DEFAULT ''"),
        ("pomodoro_sessions", "active_task_id", "INTEGER"),
        ("focus_tasks", "sort_order", "INTEGER NOT NULL DEFAULT 0"),
    ];

    for (table, column_name, column_type) in columns_to_add {
        add_column_if_missing(conn, table, column_name, column_type)?;
    }

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity_logs(timestamp)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_activity_task ON activity_logs(active_task_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_session_start ON pomodoro_sessions(start_time)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_focus_parent ON focus_tasks(parent_id)",
        [],
    )?;

    Ok(())
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column_name: &str,
    column_type: &str,
) -> Result<()> {
    let column_exists: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM pragma_table_info('{table}') WHERE name='{column_name}'"),
        [],
        |row| row.get(0),
    )?;

    if column_exists == 0 {
        conn.execute(
            &format!("ALTER TABLE {table} ADD COLUMN {column_name} {column_type}"),
            [],
        )?;
        log::info!("Added {column_name} column to {table} table");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("SELECT name FROM pragma_table_info('{table}')"))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let cols = columns(&conn, "activity_logs");
        assert!(cols.contains(&"active_task_id".to_string()));
        assert!(cols.contains(&"activity_summary".to_string()));
        assert!(columns(&conn, "pomodoro_sessions").contains(&"active_task_id".to_string()));
        assert!(columns(&conn, "focus_tasks").contains(&"sort_order".to_string()));
    }

    #[test]
    fn test_migrates_legacy_activity_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE activity_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                app_name TEXT NOT NULL,
                window_title TEXT NOT NULL,
                category TEXT NOT NULL,
                sub_category TEXT NOT NULL DEFAULT '',
                session_id TEXT
            )",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO activity_logs (timestamp, app_name, window_title, category)
             VALUES ('2024-01-01T10:00:00+00:00', 'Code', 'main.rs', 'Development')",
            [],
        )
        .unwrap();

        init_schema(&conn).unwrap();

        let summary: String = conn
            .query_row("SELECT activity_summary FROM activity_logs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(summary, "");
    }
}
