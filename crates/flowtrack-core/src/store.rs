use anyhow::Result;
use flowtrack_storage::{ActivityRecord, Database, Session, Todo};

/// Persistence used by the tracker: append-only activity log, keyed session
/// snapshots, and the focus task list
pub trait ActivityStore: Send + Sync {
    /// Append one record, returning its id
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written
    fn append_activity(&self, record: &ActivityRecord) -> Result<i64>;

    /// Insert or replace the snapshot of a session
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written
    fn upsert_session(&self, session: &Session) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the todos cannot be read
    fn list_todos(&self, include_done: bool) -> Result<Vec<Todo>>;

    /// # Errors
    ///
    /// Returns an error if the todo cannot be written
    fn add_todo(
        &self,
        title: &str,
        category: &str,
        auto: bool,
        parent_id: Option<i64>,
    ) -> Result<i64>;
}

impl ActivityStore for Database {
    fn append_activity(&self, record: &ActivityRecord) -> Result<i64> {
        Self::append_activity(self, record)
    }

    fn upsert_session(&self, session: &Session) -> Result<()> {
        Self::upsert_session(self, session)
    }

    fn list_todos(&self, include_done: bool) -> Result<Vec<Todo>> {
        self.get_todos(include_done)
    }

    fn add_todo(
        &self,
        title: &str,
        category: &str,
        auto: bool,
        parent_id: Option<i64>,
    ) -> Result<i64> {
        Self::add_todo(self, title, category, auto, parent_id)
    }
}
