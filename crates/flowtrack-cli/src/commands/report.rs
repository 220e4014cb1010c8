/// Session, activity log and todo listings
use anyhow::Result;
use chrono::{DateTime, Duration, Local, Utc};
use flowtrack_storage::{ActivityRecord, Database, Session, Todo};
use tabled::{Table, Tabled};

use super::helpers::{format_duration, truncate_str};

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Context")]
    context: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Intervals")]
    intervals: u32,
    #[tabled(rename = "Elapsed")]
    elapsed: String,
}

impl From<&Session> for SessionRow {
    fn from(session: &Session) -> Self {
        Self {
            started: local_time(session.start_time),
            category: session.category.clone(),
            context: truncate_str(&session.sub_category, 40),
            status: session.status.to_string(),
            intervals: session.completed_count,
            elapsed: format_duration(session.elapsed),
        }
    }
}

#[derive(Tabled)]
struct ActivityRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "App")]
    app: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Activity")]
    activity: String,
    #[tabled(rename = "Task")]
    task: String,
}

impl From<&ActivityRecord> for ActivityRow {
    fn from(record: &ActivityRecord) -> Self {
        Self {
            time: local_time(record.timestamp),
            app: truncate_str(&record.app_name, 20),
            category: record.category.clone(),
            activity: truncate_str(&record.activity_summary, 50),
            task: record
                .active_task_id
                .map_or_else(String::new, |id| format!("#{id}")),
        }
    }
}

#[derive(Tabled)]
struct TodoRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Task")]
    title: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Done")]
    done: &'static str,
    #[tabled(rename = "Source")]
    source: &'static str,
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn sessions(days: i64) -> Result<()> {
    let db = Database::new(None)?;
    let end = Utc::now();
    let start = end - Duration::days(days.max(1));
    let sessions = db.get_sessions(start, end)?;

    if sessions.is_empty() {
        println!("No sessions in the last {days} day(s)");
        return Ok(());
    }

    let completed: u32 = sessions.iter().map(|s| s.completed_count).sum();
    let rows = sessions.iter().map(SessionRow::from).collect::<Vec<_>>();
    println!("{}", Table::new(rows));
    println!("\n{} sessions, {completed} completed work intervals", sessions.len());
    Ok(())
}

pub fn activity_log(limit: usize) -> Result<()> {
    let db = Database::new(None)?;
    let records = db.recent_activities(limit)?;

    if records.is_empty() {
        println!("No activity recorded yet");
        return Ok(());
    }

    let rows = records.iter().map(ActivityRow::from).collect::<Vec<_>>();
    println!("{}", Table::new(rows));
    Ok(())
}

pub fn todos(include_done: bool) -> Result<()> {
    let db = Database::new(None)?;
    let todos = db.get_todos(include_done)?;

    if todos.is_empty() {
        println!("No tasks");
        return Ok(());
    }

    println!("{}", Table::new(todo_rows(&todos)));
    Ok(())
}

/// Buckets first, each followed by its children
fn todo_rows(todos: &[Todo]) -> Vec<TodoRow> {
    let row = |todo: &Todo, indent: bool| TodoRow {
        id: todo.id,
        title: if indent {
            format!("  {}", truncate_str(&todo.title, 50))
        } else {
            truncate_str(&todo.title, 52)
        },
        category: todo.category.clone(),
        done: if todo.done { "x" } else { "" },
        source: if todo.auto_generated { "auto" } else { "manual" },
    };

    let mut rows = Vec::with_capacity(todos.len());
    for parent in todos.iter().filter(|t| t.parent_id.is_none()) {
        rows.push(row(parent, false));
        for child in todos.iter().filter(|t| t.parent_id == Some(parent.id)) {
            rows.push(row(child, true));
        }
    }
    // Children whose parent is hidden (finished) still show up
    for orphan in todos
        .iter()
        .filter(|t| t.parent_id.is_some_and(|p| !todos.iter().any(|o| o.id == p)))
    {
        rows.push(row(orphan, false));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo(id: i64, title: &str, parent_id: Option<i64>) -> Todo {
        Todo {
            id,
            title: title.to_string(),
            category: "Development".to_string(),
            parent_id,
            done: false,
            auto_generated: parent_id.is_some(),
            created_at: Utc::now(),
            sort_order: 0,
        }
    }

    #[test]
    fn test_todo_rows_group_children_under_parents() {
        let todos = vec![
            todo(3, "Coding: parser.rs", Some(1)),
            todo(1, "General: Development", None),
            todo(2, "Release prep", None),
            todo(4, "Coding: lexer.rs", Some(9)),
        ];
        let titles = todo_rows(&todos)
            .into_iter()
            .map(|r| r.title)
            .collect::<Vec<_>>();
        assert_eq!(
            titles,
            vec![
                "General: Development",
                "  Coding: parser.rs",
                "Release prep",
                "Coding: lexer.rs",
            ]
        );
    }
}
