//! Progress reporting to the remote server.
//!
//! Snapshots are read from committed session state published by the control
//! service. The checkpointer runs outside the control actor and never blocks
//! it on network I/O.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::ProgressError;
use crate::types::{ItemId, Ticks};

/// Remote progress sink. Calls are fire-and-forget from the core's view.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report_progress(
        &self,
        item_id: ItemId,
        position: Ticks,
        is_paused: bool,
    ) -> Result<(), ProgressError>;
}

/// Committed playback progress. The position is already offset-corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub item_id: ItemId,
    pub position: Ticks,
    pub is_paused: bool,
}

/// Periodic progress checkpoints for the active session.
#[derive(Debug)]
pub struct ProgressCheckpointer {
    task: JoinHandle<()>,
    token: CancellationToken,
}

impl ProgressCheckpointer {
    /// Reports a snapshot every `interval` while it differs from the last
    /// one sent. Stops when `token` is cancelled or the control service is
    /// gone.
    ///
    /// `progress` comes from [`PlaybackHandle::watch_progress`]; holding it
    /// does not keep the control service alive.
    ///
    /// [`PlaybackHandle::watch_progress`]: crate::control::PlaybackHandle::watch_progress
    pub fn spawn(
        progress: watch::Receiver<Option<ProgressSnapshot>>,
        reporter: Arc<dyn ProgressReporter>,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_sent: Option<ProgressSnapshot> = None;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                // Errs once the control service dropped its sender.
                if progress.has_changed().is_err() {
                    break;
                }
                let Some(snapshot) = *progress.borrow() else {
                    continue;
                };

                if !snapshot.position.is_positive()
                    || last_sent.as_ref() == Some(&snapshot)
                {
                    continue;
                }

                match reporter
                    .report_progress(
                        snapshot.item_id,
                        snapshot.position,
                        snapshot.is_paused,
                    )
                    .await
                {
                    Ok(()) => last_sent = Some(snapshot),
                    Err(error) => tracing::warn!(
                        target: "playback::progress",
                        item = %snapshot.item_id,
                        %error,
                        "progress checkpoint failed"
                    ),
                }
            }

            tracing::debug!(target: "playback::progress", "checkpointer stopped");
        });

        Self { task, token }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop and waits for it to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(error) = self.task.await {
            tracing::warn!(
                target: "playback::progress",
                %error,
                "checkpointer task ended abnormally"
            );
        }
    }
}
