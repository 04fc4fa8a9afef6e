//! Progress monitor
//!
//! Polls the player on a fixed interval for the lifetime of a session,
//! publishes [`ProgressSnapshot`]s on a watch channel and announces the end of
//! playback.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::{Notice, PlaybackState, ProgressSnapshot};
use crate::player::Player;

/// Default tick interval
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Why the monitor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Stream played to the end
    Finished,
    /// Backend reported an error
    Failed,
    /// Stopped from outside before either happened
    Cancelled,
}

pub struct ProgressMonitor {
    token: CancellationToken,
    handle: Option<JoinHandle<MonitorOutcome>>,
    outcome: Option<MonitorOutcome>,
}

impl ProgressMonitor {
    /// Spawn the polling task
    pub fn start(
        player: Arc<Player>,
        interval: Duration,
        snapshots: watch::Sender<ProgressSnapshot>,
        notices: mpsc::UnboundedSender<Notice>,
        token: CancellationToken,
    ) -> Self {
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let outcome = run(&player, interval, &snapshots, &notices, &task_token).await;
            debug!(?outcome, "progress monitor finished");
            outcome
        });
        info!(?interval, "progress monitor started");
        Self {
            token,
            handle: Some(handle),
            outcome: None,
        }
    }

    /// Whether the task has returned on its own
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel and join; repeated calls return the first outcome
    pub async fn stop(&mut self) -> MonitorOutcome {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("progress monitor task failed: {}", e);
                    MonitorOutcome::Cancelled
                }
            };
            self.outcome = Some(outcome);
        }
        self.outcome.unwrap_or(MonitorOutcome::Cancelled)
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run(
    player: &Player,
    interval: Duration,
    snapshots: &watch::Sender<ProgressSnapshot>,
    notices: &mpsc::UnboundedSender<Notice>,
    token: &CancellationToken,
) -> MonitorOutcome {
    loop {
        if let Some(outcome) = tick(player, snapshots, notices).await {
            return outcome;
        }
        tokio::select! {
            _ = token.cancelled() => {
                // One last look so a natural end is still announced
                return tick(player, snapshots, notices)
                    .await
                    .unwrap_or(MonitorOutcome::Cancelled);
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Read the player once; `Some` when the session is over
async fn tick(
    player: &Player,
    snapshots: &watch::Sender<ProgressSnapshot>,
    notices: &mpsc::UnboundedSender<Notice>,
) -> Option<MonitorOutcome> {
    let snapshot = player.snapshot().await;
    match snapshot.state {
        PlaybackState::Playing | PlaybackState::Paused => {
            snapshots.send_replace(snapshot);
            None
        }
        PlaybackState::Ended => {
            snapshots.send_replace(ProgressSnapshot {
                position: 1.0,
                ..snapshot
            });
            let _ = notices.send(Notice::success("Playback finished!"));
            Some(MonitorOutcome::Finished)
        }
        PlaybackState::Error => {
            snapshots.send_replace(snapshot);
            let _ = notices.send(Notice::error("Playback error"));
            Some(MonitorOutcome::Failed)
        }
        _ => None,
    }
}
