use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::classifier::{default_rules, ClassificationRule};
use crate::context_analyzer::ContextRule;

/// Get the local data directory for flowtrack.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("flowtrack");
    Ok(path)
}

/// Invalid configuration values, rejected before anything starts running
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },
    #[error("{field} is too large")]
    OutOfRange { field: &'static str },
    #[error("long_break_every must be at least 1")]
    InvalidLongBreakEvery,
    #[error("invalid regex '{pattern}' in {rule}: {reason}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        reason: String,
    },
    #[error("enrichment is enabled but no command is configured")]
    MissingEnrichmentCommand,
}

/// How the tracker is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveMode {
    /// Event-driven when the window source can push changes, polling otherwise
    #[default]
    Auto,
    Poll,
    /// Event-driven; sources without push support are wrapped in a change watcher
    Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    pub poll_interval_seconds: u64,
    /// Tick-only passes in event-driven mode
    pub tick_interval_seconds: u64,
    /// How often the change watcher re-reads the active window
    pub title_check_interval_seconds: u64,
    pub idle_threshold_seconds: u64,
    pub mode: DriveMode,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 5,
            tick_interval_seconds: 15,
            title_check_interval_seconds: 3,
            idle_threshold_seconds: 300,
            mode: DriveMode::Auto,
        }
    }
}

impl TrackerSettings {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    #[must_use]
    pub const fn title_check_interval(&self) -> Duration {
        Duration::from_secs(self.title_check_interval_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        positive(self.poll_interval_seconds, "tracker.poll_interval_seconds")?;
        positive(self.tick_interval_seconds, "tracker.tick_interval_seconds")?;
        positive(
            self.title_check_interval_seconds,
            "tracker.title_check_interval_seconds",
        )?;
        positive(self.idle_threshold_seconds, "tracker.idle_threshold_seconds")
    }
}

/// Pomodoro timing and debounce settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PomodoroConfig {
    pub debounce_seconds: u64,
    pub work_minutes: u64,
    pub short_break_minutes: u64,
    pub long_break_minutes: u64,
    /// Every n-th completed work interval earns the long break
    pub long_break_every: u32,
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            debounce_seconds: 30,
            work_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            long_break_every: 4,
        }
    }
}

impl PomodoroConfig {
    /// Check every duration is usable; a zero debounce is allowed and switches immediately
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first invalid field
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive(self.work_minutes, "pomodoro.work_minutes")?;
        positive(self.short_break_minutes, "pomodoro.short_break_minutes")?;
        positive(self.long_break_minutes, "pomodoro.long_break_minutes")?;
        if self.long_break_every == 0 {
            return Err(ConfigError::InvalidLongBreakEvery);
        }
        checked_seconds(self.debounce_seconds, 1, "pomodoro.debounce_seconds")?;
        checked_seconds(self.work_minutes, 60, "pomodoro.work_minutes")?;
        checked_seconds(self.short_break_minutes, 60, "pomodoro.short_break_minutes")?;
        checked_seconds(self.long_break_minutes, 60, "pomodoro.long_break_minutes")?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoSettings {
    /// Create follow-up todos for newly seen work contexts
    pub auto_create: bool,
}

impl Default for TodoSettings {
    fn default() -> Self {
        Self { auto_create: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    pub enabled: bool,
    /// Program and leading arguments; app name and window title are appended
    pub command: Vec<String>,
    pub ttl_seconds: u64,
    pub capacity: usize,
    pub timeout_seconds: u64,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            command: Vec::new(),
            ttl_seconds: 600,
            capacity: 256,
            timeout_seconds: 5,
        }
    }
}

impl EnrichmentSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.command.is_empty() {
            return Err(ConfigError::MissingEnrichmentCommand);
        }
        positive(self.ttl_seconds, "enrichment.ttl_seconds")?;
        positive(self.timeout_seconds, "enrichment.timeout_seconds")?;
        if self.capacity == 0 {
            return Err(ConfigError::NonPositive {
                field: "enrichment.capacity",
            });
        }
        Ok(())
    }
}

/// Complete on-disk configuration (`config.toml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerSettings,
    pub pomodoro: PomodoroConfig,
    pub todos: TodoSettings,
    pub enrichment: EnrichmentSettings,
    pub classification_rules: Vec<ClassificationRule>,
    pub context_rules: Vec<ContextRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracker: TrackerSettings::default(),
            pomodoro: PomodoroConfig::default(),
            todos: TodoSettings::default(),
            enrichment: EnrichmentSettings::default(),
            classification_rules: default_rules(),
            context_rules: Vec::new(),
        }
    }
}

impl Config {
    /// Default config file location
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined
    pub fn default_path() -> Result<PathBuf> {
        Ok(get_data_dir()?.join("config.toml"))
    }

    /// Load and validate a config file; a missing file yields the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as TOML, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let raw = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, raw)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// Validate every section
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracker.validate()?;
        self.pomodoro.validate()?;
        self.enrichment.validate()?;
        for rule in &self.classification_rules {
            let name = format!("classification rule '{}'", rule.category);
            check_patterns(&name, rule.app_patterns.iter().chain(&rule.title_patterns))?;
        }
        for rule in &self.context_rules {
            let name = format!("context rule '{}'", rule.sub_category);
            check_patterns(&name, &rule.title_patterns)?;
        }
        Ok(())
    }
}

fn positive(value: u64, field: &'static str) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::NonPositive { field })
    } else {
        Ok(())
    }
}

/// `value * unit` seconds as a chrono duration; rejects what chrono cannot represent
pub(crate) fn checked_seconds(
    value: u64,
    unit: u64,
    field: &'static str,
) -> Result<chrono::Duration, ConfigError> {
    value
        .checked_mul(unit)
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(chrono::Duration::try_seconds)
        .ok_or(ConfigError::OutOfRange { field })
}

fn check_patterns<'a>(
    rule: &str,
    patterns: impl IntoIterator<Item = &'a String>,
) -> Result<(), ConfigError> {
    for pattern in patterns {
        if let Err(e) = regex::Regex::new(pattern) {
            return Err(ConfigError::InvalidPattern {
                rule: rule.to_string(),
                pattern: pattern.clone(),
                reason: e.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.pomodoro.debounce_seconds, 30);
        assert_eq!(config.pomodoro.work_minutes, 25);
        assert_eq!(config.tracker.mode, DriveMode::Auto);
        assert!(!config.classification_rules.is_empty());
    }

    #[test]
    fn test_zero_work_duration_rejected() {
        let pomodoro = PomodoroConfig {
            work_minutes: 0,
            ..PomodoroConfig::default()
        };
        assert_eq!(
            pomodoro.validate(),
            Err(ConfigError::NonPositive {
                field: "pomodoro.work_minutes"
            })
        );
    }

    #[test]
    fn test_zero_long_break_every_rejected() {
        let pomodoro = PomodoroConfig {
            long_break_every: 0,
            ..PomodoroConfig::default()
        };
        assert_eq!(pomodoro.validate(), Err(ConfigError::InvalidLongBreakEvery));
    }

    #[test]
    fn test_huge_durations_rejected() {
        let pomodoro = PomodoroConfig {
            work_minutes: 1_000_000_000_000_000,
            ..PomodoroConfig::default()
        };
        assert_eq!(
            pomodoro.validate(),
            Err(ConfigError::OutOfRange {
                field: "pomodoro.work_minutes"
            })
        );

        let pomodoro = PomodoroConfig {
            debounce_seconds: u64::MAX,
            ..PomodoroConfig::default()
        };
        assert_eq!(
            pomodoro.validate(),
            Err(ConfigError::OutOfRange {
                field: "pomodoro.debounce_seconds"
            })
        );
    }

    #[test]
    fn test_zero_debounce_allowed() {
        let pomodoro = PomodoroConfig {
            debounce_seconds: 0,
            ..PomodoroConfig::default()
        };
        assert_eq!(pomodoro.validate(), Ok(()));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let mut config = Config::default();
        config.context_rules.push(ContextRule {
            category: "Development".to_string(),
            title_patterns: vec!["(unclosed".to_string()],
            sub_category: "Broken".to_string(),
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_enrichment_requires_command() {
        let mut config = Config::default();
        config.enrichment.enabled = true;
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingEnrichmentCommand)
        );
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[tracker]\nmode = \"poll\"\n\n[pomodoro]\ndebounce_seconds = 10\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.tracker.mode, DriveMode::Poll);
        assert_eq!(config.tracker.poll_interval_seconds, 5);
        assert_eq!(config.pomodoro.debounce_seconds, 10);
        assert_eq!(config.pomodoro.long_break_every, 4);
    }

    #[test]
    fn test_invalid_file_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pomodoro]\nlong_break_every = 0\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.todos.auto_create = false;
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
