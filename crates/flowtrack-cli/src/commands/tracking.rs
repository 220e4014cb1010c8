/// Tracker lifecycle and control commands
use anyhow::{Context, Result};
use flowtrack_core::{
    config::get_data_dir,
    create_monitor,
    ipc::{default_socket_path, listen, IpcClient, IpcHandler, IpcRequest, IpcResponse},
    session_engine::Timing,
    Config, CycleDecision, StatusSnapshot, Tracker,
};
use flowtrack_storage::{Database, Session, SessionStatus};
use std::{fs, sync::Arc, time::Duration};

use super::helpers::{format_duration, truncate_str};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn start() -> Result<()> {
    let sock_path = default_socket_path()?;
    let client = IpcClient::new(&sock_path);
    if client.send_command(&IpcRequest::Status).await.is_ok() {
        println!("Tracker is already running.");
        return Ok(());
    }

    let config = Config::load(&Config::default_path()?)?;
    let db = Arc::new(Database::new(None)?);
    let source = create_monitor(Duration::from_secs(config.tracker.idle_threshold_seconds))?;
    let tracker = Tracker::new(&config, source, db)?;

    let running = tracker.spawn();
    let handle = running.handle();

    let listener = {
        let handler = IpcHandler::new(handle.clone());
        let sock_path = sock_path.clone();
        tokio::spawn(async move {
            if let Err(e) = listen(handler, &sock_path).await {
                log::error!("IPC listener failed: {e}");
            }
        })
    };

    println!("Tracking started. Press Ctrl-C to stop.");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received Ctrl-C, shutting down...");
                break;
            }
            () = tokio::time::sleep(Duration::from_secs(1)) => {
                if !handle.is_running() {
                    break;
                }
            }
        }
    }

    let result = running.shutdown(SHUTDOWN_TIMEOUT).await;
    listener.abort();
    if sock_path.exists() {
        fs::remove_file(&sock_path)?;
    }
    result?;
    println!("Tracking stopped.");
    Ok(())
}

async fn send(request: &IpcRequest) -> Result<Option<IpcResponse>> {
    let sock_path = default_socket_path()?;
    if !sock_path.exists() {
        return Ok(None);
    }
    match IpcClient::new(&sock_path).send_command(request).await {
        Ok(response) => Ok(Some(response)),
        Err(e) => {
            log::debug!("Tracker not reachable: {e:#}");
            Ok(None)
        }
    }
}

pub async fn stop() -> Result<()> {
    match send(&IpcRequest::Stop).await? {
        Some(_) => println!("Stop signal sent."),
        None => println!("Tracker is not running."),
    }
    Ok(())
}

pub async fn set_task(task_id: Option<i64>) -> Result<()> {
    if send(&IpcRequest::SetActiveTask(task_id)).await?.is_none() {
        anyhow::bail!("Tracker is not running");
    }
    match task_id {
        Some(id) => println!("Now tracking task #{id}."),
        None => println!("Task tag cleared."),
    }
    Ok(())
}

pub async fn set_enrichment(enabled: bool) -> Result<()> {
    match send(&IpcRequest::SetEnrichment(enabled)).await? {
        None => anyhow::bail!("Tracker is not running"),
        Some(IpcResponse::Rejected(reason)) => anyhow::bail!("Enrichment unchanged: {reason}"),
        Some(_) => {}
    }
    println!(
        "Enrichment {}.",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

pub async fn status(verbose: bool) -> Result<()> {
    let status = match send(&IpcRequest::Status).await? {
        Some(IpcResponse::Status(status)) => status,
        Some(IpcResponse::Ack | IpcResponse::Rejected(_)) => {
            anyhow::bail!("Unexpected response from tracker")
        }
        None => {
            println!("Tracker Status: Not running");
            return Ok(());
        }
    };

    let config = Config::load(&Config::default_path()?)?;
    let timing = Timing::from_config(&config.pomodoro)?;
    print_status(&status, &timing);
    if verbose {
        print_recent_cycles(&status.recent_cycles);
    }
    Ok(())
}

fn print_status(status: &StatusSnapshot, timing: &Timing) {
    println!(
        "Tracker Status: {}",
        if status.running { "Running" } else { "Stopped" }
    );

    match &status.active_session {
        Some(session) => {
            println!("\nCurrent Session:");
            println!("  Category:  {}", session.category);
            println!("  Context:   {}", truncate_str(&session.sub_category, 60));
            println!("  Phase:     {}", phase(session));
            println!("  Elapsed:   {}", format_duration(session.elapsed));
            if let Some(remaining) = remaining(session, timing) {
                println!("  Remaining: {}", format_duration(remaining));
            }
            println!("  Intervals: {}", session.completed_count);
        }
        None => println!("\nNo active session"),
    }

    if let Some(pending) = &status.pending_category {
        println!("  Switching to '{pending}'...");
    }

    if !status.paused_sessions.is_empty() {
        println!("\nPaused:");
        for session in &status.paused_sessions {
            println!(
                "  {} ({}, {} intervals)",
                session.category,
                format_duration(session.elapsed),
                session.completed_count
            );
        }
    }

    if let Some(activity) = &status.last_activity {
        println!("\nLast Activity:");
        println!("  {} - {}", activity.app_name, truncate_str(&activity.window_title, 60));
        println!("  {}", activity.activity_summary);
    }

    println!(
        "\nTask: {}",
        status
            .active_task_id
            .map_or_else(|| "None".to_string(), |id| format!("#{id}"))
    );
    println!(
        "Enrichment: {}",
        if status.enrichment_enabled { "on" } else { "off" }
    );
}

fn print_recent_cycles(cycles: &[CycleDecision]) {
    if cycles.is_empty() {
        return;
    }
    println!("\nRecent Cycles:");
    for cycle in cycles.iter().rev() {
        println!(
            "  {}  {:<16} {:<24} {}{}",
            cycle.at.with_timezone(&chrono::Local).format("%H:%M:%S"),
            truncate_str(&cycle.app_name, 16),
            cycle.category,
            truncate_str(&cycle.sub_category, 40),
            if cycle.enriched { " (enriched)" } else { "" }
        );
    }
}

fn phase(session: &Session) -> &'static str {
    match session.status {
        SessionStatus::Active => "Work",
        SessionStatus::Break => "Break",
        SessionStatus::Paused => "Paused",
        SessionStatus::Completed => "Completed",
    }
}

/// Time left in the current work or break interval
fn remaining(session: &Session, timing: &Timing) -> Option<chrono::Duration> {
    let length = match session.status {
        SessionStatus::Active => timing.work,
        SessionStatus::Break => timing.break_duration(session.completed_count),
        SessionStatus::Paused | SessionStatus::Completed => return None,
    };
    Some((length - session.elapsed).max(chrono::Duration::zero()))
}

/// Route logs to `<data_dir>/flowtrack.log` for long-running foreground sessions
pub fn setup_file_logging() -> Result<()> {
    use std::fs::{create_dir_all, OpenOptions};

    let log_path = get_data_dir()?.join("flowtrack.log");

    if let Some(parent) = log_path.parent() {
        create_dir_all(parent)?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open {}", log_path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .format_timestamp_secs()
        .init();

    Ok(())
}
