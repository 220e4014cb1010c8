use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub mod linux;
pub mod macos;
pub mod watcher;

pub use watcher::ChangeWatcher;

/// One focused-window sample
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Observation {
    pub app_name: String,
    pub window_title: String,
}

impl Observation {
    #[must_use]
    pub fn new(app_name: impl Into<String>, window_title: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            window_title: window_title.into(),
        }
    }
}

/// A focus change pushed by a source that supports notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusChange {
    pub observation: Observation,
    pub at: DateTime<Utc>,
}

/// Source of focused-window observations.
///
/// Both queries may fail transiently; callers treat failures as per-cycle problems.
#[async_trait]
pub trait WindowSource: Send + Sync {
    /// The focused window, or `None` when nothing usable has focus
    async fn get_observation(&self) -> Result<Option<Observation>>;

    /// Whether the user has been idle longer than the configured threshold
    async fn is_idle(&self) -> Result<bool>;

    /// Push notifications of focus changes, for sources that support them
    fn subscribe(&self) -> Option<mpsc::Receiver<FocusChange>> {
        None
    }
}

/// Create the window source for the current platform
///
/// # Errors
///
/// Returns an error if the current platform is not supported
pub fn create_monitor(idle_threshold: Duration) -> Result<Arc<dyn WindowSource>> {
    #[cfg(target_os = "macos")]
    {
        Ok(Arc::new(macos::MacOSMonitor::new(idle_threshold)))
    }

    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(linux::LinuxMonitor::new(idle_threshold)))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        let _ = idle_threshold;
        anyhow::bail!("Unsupported platform")
    }
}
