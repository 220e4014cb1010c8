use std::collections::HashSet;

use crate::classifier::DEFAULT_CATEGORY;
use crate::store::ActivityStore;

const MIN_LABEL_CHARS: usize = 5;

const ACTION_PREFIXES: &[&str] = &[
    "writing",
    "emailing",
    "browsing",
    "coding",
    "designing",
    "meeting",
    "chat",
    "task",
    "spreadsheet",
    "presentation",
];

/// Labels that only name the application, not the work
const APP_NAMES: &[&str] = &[
    "google chrome",
    "firefox",
    "safari",
    "edge",
    "brave",
    "arc",
    "chrome",
    "opera",
    "slack",
    "discord",
    "zoom",
    "teams",
    "outlook",
    "mail",
    "terminal",
    "iterm",
    "finder",
    "explorer",
    "code",
    "vs code",
    "visual studio code",
    "electron",
];

/// Creates follow-up todos when a meaningful new work context shows up
#[derive(Debug, Default)]
pub struct TodoPolicy {
    enabled: bool,
    seen: HashSet<String>,
}

impl TodoPolicy {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            seen: HashSet::new(),
        }
    }

    /// Create a todo for this context unless it is generic or already known.
    /// Store failures are logged and swallowed; returns the new todo id.
    pub fn maybe_create(
        &mut self,
        category: &str,
        sub_category: &str,
        store: &dyn ActivityStore,
    ) -> Option<i64> {
        if !self.enabled || !is_meaningful(category, sub_category) {
            return None;
        }

        let key = format!("{category}::{sub_category}");
        if !self.seen.insert(key) {
            return None;
        }

        let normalized = normalize_title(sub_category);
        match store.list_todos(true) {
            Ok(todos) if todos.iter().any(|t| normalize_title(&t.title) == normalized) => {
                return None;
            }
            Ok(_) => {}
            Err(e) => log::debug!("Could not check existing todos: {e:#}"),
        }

        let parent_id = find_or_create_bucket(category, store);
        match store.add_todo(sub_category, category, true, parent_id) {
            Ok(id) => {
                log::info!("Added follow-up todo '{sub_category}' under '{category}'");
                Some(id)
            }
            Err(e) => {
                log::warn!("Could not auto-create todo for {category}::{sub_category}: {e:#}");
                None
            }
        }
    }
}

fn is_meaningful(category: &str, sub_category: &str) -> bool {
    if category == DEFAULT_CATEGORY || sub_category.is_empty() {
        return false;
    }
    let lowered = sub_category.trim().to_lowercase();
    lowered != category.to_lowercase()
        && sub_category.chars().count() >= MIN_LABEL_CHARS
        && !APP_NAMES.contains(&lowered.as_str())
}

/// First manual top-level todo of the category, or a new `General: <category>` bucket
fn find_or_create_bucket(category: &str, store: &dyn ActivityStore) -> Option<i64> {
    let todos = match store.list_todos(true) {
        Ok(todos) => todos,
        Err(e) => {
            log::debug!("Could not list todos: {e:#}");
            return None;
        }
    };
    if let Some(bucket) = todos
        .iter()
        .find(|t| t.is_bucket() && t.category.eq_ignore_ascii_case(category))
    {
        return Some(bucket.id);
    }
    store
        .add_todo(&format!("General: {category}"), category, false, None)
        .map_err(|e| log::debug!("Could not create bucket for '{category}': {e:#}"))
        .ok()
}

/// Lowercase and strip the action prefixes used in generated titles
fn normalize_title(title: &str) -> String {
    let mut normalized = title.trim().to_lowercase();
    if let Some(rest) = normalized.strip_prefix("work on:") {
        normalized = rest.trim_start().to_string();
    }
    if let Some(rest) = ACTION_PREFIXES
        .iter()
        .find_map(|prefix| normalized.strip_prefix(prefix)?.strip_prefix(':'))
    {
        normalized = rest.to_string();
    }
    normalized.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use flowtrack_storage::{ActivityRecord, Database, Session, Todo};

    struct BrokenStore;

    impl ActivityStore for BrokenStore {
        fn append_activity(&self, _record: &ActivityRecord) -> Result<i64> {
            anyhow::bail!("disk full")
        }
        fn upsert_session(&self, _session: &Session) -> Result<()> {
            anyhow::bail!("disk full")
        }
        fn list_todos(&self, _include_done: bool) -> Result<Vec<Todo>> {
            anyhow::bail!("disk full")
        }
        fn add_todo(&self, _: &str, _: &str, _: bool, _: Option<i64>) -> Result<i64> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("Coding: parser.rs"), "parser.rs");
        assert_eq!(normalize_title("Work on: Writing: Q3 Report"), "q3 report");
        assert_eq!(normalize_title("  Budget Review "), "budget review");
    }

    #[test]
    fn test_generic_labels_skipped() {
        assert!(!is_meaningful("Other", "something long"));
        assert!(!is_meaningful("Development", ""));
        assert!(!is_meaningful("Development", "development"));
        assert!(!is_meaningful("Development", "abcd"));
        assert!(!is_meaningful("Research & Browsing", "Google Chrome"));
        assert!(is_meaningful("Development", "parser.rs"));
    }

    #[test]
    fn test_creates_todo_under_general_bucket() {
        let db = Database::open_in_memory().unwrap();
        let mut policy = TodoPolicy::new(true);

        let id = policy
            .maybe_create("Document Editing", "Q3 Planning Doc", &db)
            .unwrap();

        let todos = db.get_todos(true).unwrap();
        let bucket = todos
            .iter()
            .find(|t| t.title == "General: Document Editing")
            .unwrap();
        assert!(!bucket.auto_generated);
        let todo = todos.iter().find(|t| t.id == id).unwrap();
        assert!(todo.auto_generated);
        assert_eq!(todo.parent_id, Some(bucket.id));
    }

    #[test]
    fn test_attaches_to_manual_bucket() {
        let db = Database::open_in_memory().unwrap();
        let manual = db.add_todo("Launch prep", "meetings", false, None).unwrap();
        let mut policy = TodoPolicy::new(true);

        let id = policy.maybe_create("Meetings", "Sprint Review", &db).unwrap();
        let todos = db.get_todos(true).unwrap();
        assert_eq!(todos.len(), 2);
        assert_eq!(
            todos.iter().find(|t| t.id == id).unwrap().parent_id,
            Some(manual)
        );
    }

    #[test]
    fn test_deduplicates() {
        let db = Database::open_in_memory().unwrap();
        let mut policy = TodoPolicy::new(true);

        assert!(policy.maybe_create("Development", "parser.rs", &db).is_some());
        assert!(policy.maybe_create("Development", "parser.rs", &db).is_none());

        // A fresh policy still sees the stored todo
        db.add_todo("Writing: Release Notes", "Document Editing", false, None)
            .unwrap();
        let mut fresh = TodoPolicy::new(true);
        assert!(fresh
            .maybe_create("Document Editing", "release notes", &db)
            .is_none());
    }

    #[test]
    fn test_disabled_policy_creates_nothing() {
        let db = Database::open_in_memory().unwrap();
        let mut policy = TodoPolicy::new(false);
        assert!(policy.maybe_create("Development", "parser.rs", &db).is_none());
        assert!(db.get_todos(true).unwrap().is_empty());
    }

    #[test]
    fn test_store_failures_swallowed() {
        let mut policy = TodoPolicy::new(true);
        assert!(policy
            .maybe_create("Development", "parser.rs", &BrokenStore)
            .is_none());
    }
}
