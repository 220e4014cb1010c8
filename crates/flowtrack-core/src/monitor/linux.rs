//! X11 window source backed by `xdotool` and `xprintidle`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use super::{Observation, WindowSource};

pub struct LinuxMonitor {
    idle_threshold: Duration,
}

impl LinuxMonitor {
    #[must_use]
    pub const fn new(idle_threshold: Duration) -> Self {
        Self { idle_threshold }
    }

    /// Run `xdotool getactivewindow <query>`; `None` when no window has focus
    async fn xdotool(query: &str) -> Result<Option<String>> {
        let output = Command::new("xdotool")
            .args(["getactivewindow", query])
            .output()
            .await
            .context("Failed to run xdotool")?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ))
    }

    async fn process_name(pid: u32) -> Option<String> {
        tokio::fs::read_to_string(format!("/proc/{pid}/comm"))
            .await
            .ok()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
    }

    async fn idle_time() -> Result<Duration> {
        let output = Command::new("xprintidle")
            .output()
            .await
            .context("Failed to run xprintidle")?;
        if !output.status.success() {
            anyhow::bail!("xprintidle exited with {}", output.status);
        }
        parse_xprintidle(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl WindowSource for LinuxMonitor {
    async fn get_observation(&self) -> Result<Option<Observation>> {
        let Some(title) = Self::xdotool("getwindowname").await? else {
            return Ok(None);
        };
        let pid = Self::xdotool("getwindowpid")
            .await?
            .and_then(|out| parse_pid(&out));
        let app_name = match pid {
            Some(pid) => Self::process_name(pid).await,
            None => None,
        };
        Ok(observation_from_parts(app_name, title))
    }

    async fn is_idle(&self) -> Result<bool> {
        Ok(Self::idle_time().await? >= self.idle_threshold)
    }
}

/// `xprintidle` prints milliseconds since the last input event
fn parse_xprintidle(output: &str) -> Result<Duration> {
    let millis = output
        .trim()
        .parse::<u64>()
        .with_context(|| format!("Unexpected xprintidle output: {output:?}"))?;
    Ok(Duration::from_millis(millis))
}

fn parse_pid(output: &str) -> Option<u32> {
    output.trim().parse().ok()
}

/// Windows without a resolvable process fall back to the title as app name
fn observation_from_parts(app_name: Option<String>, title: String) -> Option<Observation> {
    match app_name {
        Some(app) => Some(Observation::new(app, title)),
        None if !title.is_empty() => Some(Observation::new(title.clone(), title)),
        None => None,
    }
}
