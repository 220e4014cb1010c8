pub mod classifier;
pub mod config;
pub mod context_analyzer;
pub mod enrichment;
#[cfg(unix)]
pub mod ipc;
pub mod monitor;
pub mod session_engine;
pub mod store;
pub mod todo_policy;
pub mod tracker;

pub use classifier::Classifier;
pub use config::{Config, ConfigError, DriveMode, PomodoroConfig};
pub use context_analyzer::{CategoryResult, ContextAnalyzer};
pub use monitor::{create_monitor, FocusChange, Observation, WindowSource};
pub use session_engine::{PendingSwitch, SessionEngine, SessionEvent};
pub use store::ActivityStore;
pub use tracker::{
    CycleDecision, CycleOutcome, RunningTracker, StatusSnapshot, Tracker, TrackerHandle,
};
