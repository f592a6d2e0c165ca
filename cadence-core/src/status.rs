//! User-facing playback status.
//!
//! Collapses engine states, buffering signals and resume outcomes into one
//! status stream. Attempt counts and protocol details never leave the core.

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;

use crate::buffering::BufferingSignal;
use crate::engine::EngineState;
use crate::error::ResumeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackErrorKind {
    ResumeTimeout,
    ResumeStuck,
    Engine,
    Source,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Buffering,
    Playing,
    Paused,
    /// Buffering has run past the stall timeout. Advisory only.
    Stalled,
    Ended,
    Error(PlaybackErrorKind),
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackStatus::Idle => f.write_str("idle"),
            PlaybackStatus::Buffering => f.write_str("buffering"),
            PlaybackStatus::Playing => f.write_str("playing"),
            PlaybackStatus::Paused => f.write_str("paused"),
            PlaybackStatus::Stalled => f.write_str("stalled"),
            PlaybackStatus::Ended => f.write_str("ended"),
            PlaybackStatus::Error(kind) => write!(f, "error ({kind:?})"),
        }
    }
}

/// Every status transition, in order. Subscribers that fall behind skip the
/// transitions they missed.
pub type StatusStream = BoxStream<'static, PlaybackStatus>;

const TRANSITION_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct PlaybackStateOrchestrator {
    latest: watch::Sender<PlaybackStatus>,
    transitions: broadcast::Sender<PlaybackStatus>,
}

impl Default for PlaybackStateOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackStateOrchestrator {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(PlaybackStatus::Idle);
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            latest,
            transitions,
        }
    }

    pub fn current(&self) -> PlaybackStatus {
        *self.latest.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<PlaybackStatus> {
        self.latest.subscribe()
    }

    pub fn subscribe(&self) -> StatusStream {
        BroadcastStream::new(self.transitions.subscribe())
            .filter_map(|status| async move { status.ok() })
            .boxed()
    }

    /// Buffering signals are the only source of Buffering, Stalled and the
    /// Playing that follows a buffering episode.
    pub fn on_buffering(&self, signal: &BufferingSignal) {
        match signal {
            BufferingSignal::Started { .. } => {
                self.publish(PlaybackStatus::Buffering)
            }
            BufferingSignal::Stalled { .. } => {
                self.publish(PlaybackStatus::Stalled)
            }
            BufferingSignal::Recovered { .. } => {
                self.publish(PlaybackStatus::Playing)
            }
            BufferingSignal::Discarded { .. } => {}
        }
    }

    pub fn on_engine_state(&self, state: EngineState) {
        match state {
            EngineState::Paused => self.publish(PlaybackStatus::Paused),
            // Unpausing never goes through a buffering episode.
            EngineState::Playing if self.current() == PlaybackStatus::Paused => {
                self.publish(PlaybackStatus::Playing)
            }
            EngineState::Ended => self.publish(PlaybackStatus::Ended),
            EngineState::Error => {
                self.publish(PlaybackStatus::Error(PlaybackErrorKind::Engine))
            }
            EngineState::Idle
            | EngineState::Opening
            | EngineState::Buffering
            | EngineState::Playing => {}
        }
    }

    /// Surfaces timeout and stuck outcomes; cancellations stay silent.
    pub fn on_resume_failed(&self, error: &ResumeError) {
        let kind = match error {
            ResumeError::Timeout { .. } => PlaybackErrorKind::ResumeTimeout,
            ResumeError::Stuck { .. } => PlaybackErrorKind::ResumeStuck,
            _ => return,
        };
        self.publish(PlaybackStatus::Error(kind));
    }

    /// Playback moved forward. Timeout and stuck resumes are non-fatal, so
    /// the first real progress after one clears it back to Playing.
    pub fn on_progress(&self, state: EngineState) {
        let recoverable = matches!(
            self.current(),
            PlaybackStatus::Error(
                PlaybackErrorKind::ResumeTimeout | PlaybackErrorKind::ResumeStuck
            )
        );
        if recoverable && state == EngineState::Playing {
            self.publish(PlaybackStatus::Playing);
        }
    }

    pub fn on_fault(&self, kind: PlaybackErrorKind) {
        self.publish(PlaybackStatus::Error(kind));
    }

    pub fn on_stopped(&self) {
        self.publish(PlaybackStatus::Idle);
    }

    fn publish(&self, status: PlaybackStatus) {
        let changed = self.latest.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if !changed {
            return;
        }

        tracing::debug!(target: "playback::status", %status, "status changed");
        // No subscribers is fine.
        let _ = self.transitions.send(status);
    }
}
