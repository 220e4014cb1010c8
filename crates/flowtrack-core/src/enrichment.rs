//! Optional activity summaries produced by an external command.
//!
//! The regex pipeline gives a category and a short label; an enricher can add a
//! human-readable description of what the user is doing. Results are cached per
//! (app, title) so a long stay in one window costs one lookup per TTL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

use crate::config::EnrichmentSettings;
use crate::monitor::Observation;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(v) => v,
    None => unreachable!(),
};

/// Produces a one-line summary for an observation
#[async_trait]
pub trait Enricher: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the summary could not be produced
    async fn summarize(&self, observation: &Observation) -> Result<Option<String>>;
}

/// Runs `program args... <app_name> <window_title>` and takes the first
/// non-empty stdout line
pub struct CommandEnricher {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandEnricher {
    /// # Errors
    ///
    /// Returns an error if `command` is empty
    pub fn new(command: &[String], timeout: Duration) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .context("Enrichment command is empty")?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }
}

#[async_trait]
impl Enricher for CommandEnricher {
    async fn summarize(&self, observation: &Observation) -> Result<Option<String>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&observation.app_name)
            .arg(&observation.window_title)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, output)
            .await
            .with_context(|| format!("'{}' timed out after {:?}", self.program, self.timeout))?
            .with_context(|| format!("Failed to run '{}'", self.program))?;

        if !output.status.success() {
            anyhow::bail!("'{}' exited with {}", self.program, output.status);
        }
        Ok(first_line(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn first_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(ToString::to_string)
}

struct CacheEntry {
    // Empty when the enricher had nothing to say
    summary: String,
    stored_at: Instant,
}

/// LRU of summaries keyed by (app, title), with entries expiring after a TTL
pub struct EnrichmentCache {
    entries: LruCache<(String, String), CacheEntry>,
    ttl: Duration,
}

impl EnrichmentCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Fresh cached summary; `Some("")` means a cached miss
    pub fn get(&mut self, observation: &Observation, now: Instant) -> Option<&str> {
        let key = cache_key(observation);
        let expired = self
            .entries
            .peek(&key)
            .is_some_and(|entry| now.saturating_duration_since(entry.stored_at) >= self.ttl);
        if expired {
            self.entries.pop(&key);
            return None;
        }
        self.entries.get(&key).map(|entry| entry.summary.as_str())
    }

    pub fn insert(&mut self, observation: &Observation, summary: Option<&str>, now: Instant) {
        self.entries.put(
            cache_key(observation),
            CacheEntry {
                summary: summary.unwrap_or_default().to_string(),
                stored_at: now,
            },
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cache_key(observation: &Observation) -> (String, String) {
    (
        observation.app_name.clone(),
        observation.window_title.clone(),
    )
}

/// Enricher plus its cache, owned by the tracker
pub struct Enrichment {
    enricher: Box<dyn Enricher>,
    cache: EnrichmentCache,
}

impl Enrichment {
    #[must_use]
    pub fn new(enricher: Box<dyn Enricher>, cache: EnrichmentCache) -> Self {
        Self { enricher, cache }
    }

    /// Build from settings; `None` when no command is configured
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be used
    pub fn from_settings(settings: &EnrichmentSettings) -> Result<Option<Self>> {
        if settings.command.is_empty() {
            return Ok(None);
        }
        let enricher = CommandEnricher::new(
            &settings.command,
            Duration::from_secs(settings.timeout_seconds),
        )?;
        let cache = EnrichmentCache::new(
            settings.capacity,
            Duration::from_secs(settings.ttl_seconds),
        );
        Ok(Some(Self::new(Box::new(enricher), cache)))
    }

    /// Summary for the observation, from cache or a fresh lookup.
    /// Lookup failures are cached as misses until the entry expires.
    pub async fn summary(&mut self, observation: &Observation, now: Instant) -> Option<String> {
        if let Some(cached) = self.cache.get(observation, now) {
            return (!cached.is_empty()).then(|| cached.to_string());
        }

        let summary = match self.enricher.summarize(observation).await {
            Ok(summary) => summary,
            Err(e) => {
                log::debug!("Enrichment failed for '{}': {e:#}", observation.app_name);
                None
            }
        };
        self.cache.insert(observation, summary.as_deref(), now);
        summary
    }
}
