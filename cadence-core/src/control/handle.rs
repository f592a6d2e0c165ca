use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

use super::messages::{PlaybackCommand, Reply};
use crate::error::{PlaybackError, Result};
use crate::progress::ProgressSnapshot;
use crate::restart::{RestartReport, RestartRequest};
use crate::resume::ResumeSuccess;
use crate::status::{PlaybackStateOrchestrator, PlaybackStatus, StatusStream};
use crate::types::{PlaybackRequest, PlaybackSession, Ticks};

/// Cloneable handle to a running control service.
///
/// Every mutating call is queued on the actor and answered once the actor
/// has processed it. Dropping the last handle shuts the service down.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    command_tx: mpsc::UnboundedSender<PlaybackCommand>,
    status: Arc<PlaybackStateOrchestrator>,
    progress: watch::Receiver<Option<ProgressSnapshot>>,
}

impl PlaybackHandle {
    pub(crate) fn new(
        command_tx: mpsc::UnboundedSender<PlaybackCommand>,
        status: Arc<PlaybackStateOrchestrator>,
        progress: watch::Receiver<Option<ProgressSnapshot>>,
    ) -> Self {
        Self {
            command_tx,
            status,
            progress,
        }
    }

    /// Resolves the source, opens the engine and resumes at the request's
    /// start position once the engine is ready. Replaces any running session.
    pub async fn start(&self, request: PlaybackRequest) -> Result<PlaybackSession> {
        self.call(|reply| PlaybackCommand::Start { request, reply })
            .await
    }

    /// Explicit user seek to an absolute position. Supersedes a running
    /// resume.
    pub async fn seek(&self, position: Ticks) -> Result<()> {
        self.call(|reply| PlaybackCommand::Seek { position, reply })
            .await
    }

    /// Seeks relative to the current position, clamped at zero.
    pub async fn seek_relative(&self, delta: Ticks) -> Result<()> {
        self.call(|reply| PlaybackCommand::SeekRelative { delta, reply })
            .await
    }

    pub async fn pause(&self) -> Result<()> {
        self.call(|reply| PlaybackCommand::Pause { reply }).await
    }

    pub async fn play(&self) -> Result<()> {
        self.call(|reply| PlaybackCommand::Play { reply }).await
    }

    /// Restarts the session with a new track, subtitle or bitrate and waits
    /// for the follow-up resume to finish.
    pub async fn change_track(
        &self,
        request: RestartRequest,
    ) -> Result<RestartReport> {
        self.call(|reply| PlaybackCommand::ChangeTrack { request, reply })
            .await
    }

    /// Resumes the current session at `target`. Fails immediately with
    /// `AlreadyInFlight` while another cycle runs.
    pub async fn try_resume(&self, target: Ticks) -> Result<ResumeSuccess> {
        self.call(|reply| PlaybackCommand::TryResume { target, reply })
            .await
    }

    /// Stops playback. Calling it without a session is a no-op.
    pub async fn stop(&self) -> Result<()> {
        self.call(|reply| PlaybackCommand::Stop { reply }).await
    }

    pub async fn session(&self) -> Result<Option<PlaybackSession>> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(PlaybackCommand::Session { reply })
            .map_err(|_| PlaybackError::ServiceStopped)?;
        rx.await.map_err(|_| PlaybackError::ServiceStopped)
    }

    /// Last committed progress of the active session.
    pub fn progress_snapshot(&self) -> Option<ProgressSnapshot> {
        *self.progress.borrow()
    }

    /// Committed progress as it changes. Unlike the handle itself, the
    /// receiver does not keep the service running.
    pub fn watch_progress(&self) -> watch::Receiver<Option<ProgressSnapshot>> {
        self.progress.clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status.current()
    }

    /// Every status transition from now on.
    pub fn subscribe_status(&self) -> StatusStream {
        self.status.subscribe()
    }

    pub fn watch_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.watch()
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> PlaybackCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(command(reply))
            .map_err(|_| PlaybackError::ServiceStopped)?;
        rx.await.map_err(|_| PlaybackError::ServiceStopped)?
    }
}
