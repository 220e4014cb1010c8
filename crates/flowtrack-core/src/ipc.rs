use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{UnixListener, UnixStream},
};

use crate::config::get_data_dir;
use crate::tracker::{StatusSnapshot, TrackerHandle};

/// IPC request from CLI to daemon
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum IpcRequest {
    Status,
    Stop,
    SetActiveTask(Option<i64>),
    SetEnrichment(bool),
}

/// IPC response from daemon to CLI
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum IpcResponse {
    Status(StatusSnapshot),
    Ack,
    /// The request was understood but could not be applied
    Rejected(String),
}

/// Default socket location inside the data directory
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined
pub fn default_socket_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("flowtrack.sock"))
}

#[derive(Debug)]
pub struct IpcClient {
    sock_path: PathBuf,
}

impl IpcClient {
    #[must_use]
    pub fn new(sock_path: &Path) -> Self {
        Self {
            sock_path: sock_path.to_path_buf(),
        }
    }

    /// Send one request and wait for the reply
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon is not reachable or replies with garbage
    pub async fn send_command(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.sock_path)
            .await
            .with_context(|| format!("Is the tracker running? ({})", self.sock_path.display()))?;

        let encoded = bincode::serialize(request)?;
        stream.write_all(&encoded).await?;
        stream.shutdown().await?;

        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).await?;
        let response: IpcResponse =
            bincode::deserialize(&buffer).context("Malformed response from tracker")?;

        Ok(response)
    }
}

/// Applies IPC requests to a running tracker
#[derive(Debug, Clone)]
pub struct IpcHandler {
    tracker: TrackerHandle,
}

impl IpcHandler {
    #[must_use]
    pub const fn new(tracker: TrackerHandle) -> Self {
        Self { tracker }
    }

    #[must_use]
    pub fn respond(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Status => IpcResponse::Status(self.tracker.status()),
            IpcRequest::Stop => {
                log::info!("Stop requested over IPC");
                self.tracker.stop();
                IpcResponse::Ack
            }
            IpcRequest::SetActiveTask(task_id) => {
                self.tracker.set_active_task(task_id);
                IpcResponse::Ack
            }
            IpcRequest::SetEnrichment(enabled) => {
                if self.tracker.set_enrichment_enabled(enabled) {
                    IpcResponse::Ack
                } else {
                    IpcResponse::Rejected(
                        "no enrichment command is configured ([enrichment] command)".to_string(),
                    )
                }
            }
        }
    }

    async fn handle(&self, stream: &mut UnixStream) -> Result<()> {
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await?;
        if buf.is_empty() {
            return Ok(());
        }
        let request = bincode::deserialize::<IpcRequest>(&buf)?;
        let encoded = bincode::serialize(&self.respond(request))?;
        stream.write_all(&encoded).await?;
        Ok(())
    }
}

/// Accept connections until the task is dropped or aborted
///
/// # Errors
///
/// Returns an error if the socket cannot be bound
pub async fn listen(handler: IpcHandler, sock_path: &Path) -> io::Result<()> {
    if sock_path.exists() {
        fs::remove_file(sock_path)?;
    }
    if let Some(parent) = sock_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(sock_path)?;
    log::debug!("IPC listening on {}", sock_path.display());

    loop {
        match listener.accept().await {
            Ok((mut stream, _)) => {
                let handler = handler.clone();
                tokio::spawn(async move {
                    if let Err(e) = handler.handle(&mut stream).await {
                        log::error!("IPC handle error: {e}");
                    }
                });
            }
            Err(e) => {
                log::error!("IPC accept error: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::monitor::{Observation, WindowSource};
    use crate::tracker::Tracker;
    use async_trait::async_trait;
    use flowtrack_storage::Database;
    use std::sync::Arc;
    use std::time::Duration;

    struct Quiet;

    #[async_trait]
    impl WindowSource for Quiet {
        async fn get_observation(&self) -> Result<Option<Observation>> {
            Ok(None)
        }

        async fn is_idle(&self) -> Result<bool> {
            Ok(false)
        }
    }

    fn tracker_handle() -> TrackerHandle {
        let db = Arc::new(Database::open_in_memory().unwrap());
        Tracker::new(&Config::default(), Arc::new(Quiet), db)
            .unwrap()
            .handle()
    }

    #[test]
    fn test_respond_applies_controls() {
        let handle = tracker_handle();
        let handler = IpcHandler::new(handle.clone());

        assert_eq!(
            handler.respond(IpcRequest::SetActiveTask(Some(5))),
            IpcResponse::Ack
        );
        assert_eq!(handle.active_task(), Some(5));

        match handler.respond(IpcRequest::Status) {
            IpcResponse::Status(status) => {
                assert_eq!(status.active_task_id, Some(5));
                assert!(!status.running);
            }
            other => panic!("expected status, got {other:?}"),
        }
    }

    #[test]
    fn test_enrichment_rejected_without_command() {
        let handle = tracker_handle();
        let handler = IpcHandler::new(handle.clone());

        assert!(matches!(
            handler.respond(IpcRequest::SetEnrichment(true)),
            IpcResponse::Rejected(_)
        ));
        assert!(!handle.enrichment_enabled());
        assert_eq!(
            handler.respond(IpcRequest::SetEnrichment(false)),
            IpcResponse::Ack
        );
    }

    #[tokio::test]
    async fn test_round_trip_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("flowtrack.sock");
        let handle = tracker_handle();

        let listener = {
            let handler = IpcHandler::new(handle.clone());
            let sock_path = sock_path.clone();
            tokio::spawn(async move { listen(handler, &sock_path).await })
        };
        for _ in 0..100 {
            if sock_path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let client = IpcClient::new(&sock_path);
        let response = client
            .send_command(&IpcRequest::SetActiveTask(Some(9)))
            .await
            .unwrap();
        assert_eq!(response, IpcResponse::Ack);
        assert_eq!(handle.active_task(), Some(9));

        let IpcResponse::Status(status) = client.send_command(&IpcRequest::Status).await.unwrap()
        else {
            panic!("expected status");
        };
        assert_eq!(status.active_task_id, Some(9));

        listener.abort();
    }
}
