use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::{FocusChange, Observation, WindowSource};

const CHANNEL_CAPACITY: usize = 32;

/// Turns a pull-only source into a stream of focus changes by polling
/// it cheaply and forwarding only observations that differ from the last one.
pub struct ChangeWatcher {
    source: Arc<dyn WindowSource>,
    check_interval: Duration,
}

impl ChangeWatcher {
    #[must_use]
    pub fn new(source: Arc<dyn WindowSource>, check_interval: Duration) -> Self {
        Self {
            source,
            check_interval,
        }
    }

    /// Start watching. The task ends once the receiver is dropped.
    #[must_use]
    pub fn spawn(self) -> (mpsc::Receiver<FocusChange>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(self.check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<Observation> = None;

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }
                let observation = match self.source.get_observation().await {
                    Ok(Some(observation)) => observation,
                    Ok(None) => continue,
                    Err(e) => {
                        log::debug!("Focus check failed: {e}");
                        continue;
                    }
                };
                if last.as_ref() == Some(&observation) {
                    continue;
                }
                last = Some(observation.clone());
                let change = FocusChange {
                    observation,
                    at: Utc::now(),
                };
                if tx.send(change).await.is_err() {
                    break;
                }
            }
            log::debug!("Focus watcher stopped");
        });
        (rx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted(Mutex<VecDeque<Option<Observation>>>);

    #[async_trait]
    impl WindowSource for Scripted {
        async fn get_observation(&self) -> Result<Option<Observation>> {
            let next = self.0.lock().unwrap().pop_front();
            match next {
                Some(observation) => Ok(observation),
                None => anyhow::bail!("script exhausted"),
            }
        }

        async fn is_idle(&self) -> Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_forwards_only_changes() {
        let code = Observation::new("Code", "main.rs");
        let mail = Observation::new("Mail", "Inbox");
        let script = vec![
            Some(code.clone()),
            Some(code.clone()),
            None,
            Some(mail.clone()),
            Some(mail.clone()),
            Some(code.clone()),
        ];
        let source = Arc::new(Scripted(Mutex::new(script.into())));
        let (mut rx, handle) = ChangeWatcher::new(source, Duration::from_millis(1)).spawn();

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(rx.recv().await.unwrap().observation);
        }
        assert_eq!(seen, vec![code.clone(), mail, code]);

        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
