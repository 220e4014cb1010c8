use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use super::{Observation, WindowSource};

// Returns "appName|windowTitle" for the frontmost process
const FRONTMOST_SCRIPT: &str = r#"
    tell application "System Events"
        set frontProc to first application process whose frontmost is true
        set appName to name of frontProc
        try
            set winTitle to name of first window of frontProc
        on error
            set winTitle to ""
        end try
        return appName & "|" & winTitle
    end tell
"#;

pub struct MacOSMonitor {
    idle_threshold: Duration,
}

impl MacOSMonitor {
    #[must_use]
    pub const fn new(idle_threshold: Duration) -> Self {
        Self { idle_threshold }
    }

    /// Time since the last keyboard/mouse/trackpad event
    async fn idle_time() -> Result<Duration> {
        let output = Command::new("ioreg")
            .args(["-c", "IOHIDSystem"])
            .output()
            .await
            .context("Failed to run ioreg")?;
        if !output.status.success() {
            anyhow::bail!("ioreg exited with {}", output.status);
        }
        parse_hid_idle(&String::from_utf8_lossy(&output.stdout))
            .context("HIDIdleTime not found in ioreg output")
    }
}

#[async_trait]
impl WindowSource for MacOSMonitor {
    async fn get_observation(&self) -> Result<Option<Observation>> {
        let output = Command::new("osascript")
            .arg("-e")
            .arg(FRONTMOST_SCRIPT)
            .output()
            .await
            .context("Failed to run osascript")?;
        if !output.status.success() {
            anyhow::bail!(
                "osascript failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(parse_frontmost(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn is_idle(&self) -> Result<bool> {
        Ok(Self::idle_time().await? >= self.idle_threshold)
    }
}

fn parse_frontmost(output: &str) -> Option<Observation> {
    let (app_name, title) = output.trim().split_once('|')?;
    if app_name.is_empty() {
        return None;
    }
    Some(Observation::new(app_name, title))
}

/// `HIDIdleTime` is reported in nanoseconds
fn parse_hid_idle(output: &str) -> Option<Duration> {
    output
        .lines()
        .find(|line| line.contains("\"HIDIdleTime\""))
        .and_then(|line| line.rsplit('=').next())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frontmost() {
        assert_eq!(
            parse_frontmost("Code|main.rs - flowtrack\n"),
            Some(Observation::new("Code", "main.rs - flowtrack"))
        );
        // Titles may themselves contain the separator
        assert_eq!(
            parse_frontmost("Safari|a|b"),
            Some(Observation::new("Safari", "a|b"))
        );
        assert_eq!(
            parse_frontmost("Finder|"),
            Some(Observation::new("Finder", ""))
        );
        assert_eq!(parse_frontmost(""), None);
    }

    #[test]
    fn test_parse_hid_idle() {
        let output = r#"
    | |   "HIDIdleTime" = 2500000000
    | |   "HIDParameters" = {}
"#;
        assert_eq!(parse_hid_idle(output), Some(Duration::from_millis(2500)));
        assert_eq!(parse_hid_idle("nothing here"), None);
    }
}
