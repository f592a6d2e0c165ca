//! Playback control service.
//!
//! A single actor task owns the session, the resume flow and buffering
//! tracking. Commands from [`PlaybackHandle`]s, engine notifications and
//! timer expiries are queued and processed one at a time.

mod actor;
mod handle;
mod messages;
mod timers;

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub use handle::PlaybackHandle;

use crate::clock::{Clock, TokioClock};
use crate::engine::PlayerEngine;
use crate::policy::{PlaybackPolicy, PreferencesStore};
use crate::source::{MediaSourceResolver, PlaybackSourceResolver};
use crate::status::PlaybackStateOrchestrator;
use actor::{ActorParts, PlaybackActor};

/// Builder for the control actor.
pub struct PlaybackControlService {
    engine: Arc<dyn PlayerEngine>,
    resolver: PlaybackSourceResolver,
    policy: Arc<PlaybackPolicy>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for PlaybackControlService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackControlService")
            .field("policy", &self.policy)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl PlaybackControlService {
    pub fn new(
        engine: Arc<dyn PlayerEngine>,
        resolver: Arc<dyn MediaSourceResolver>,
        preferences: &dyn PreferencesStore,
    ) -> Self {
        Self {
            engine,
            resolver: PlaybackSourceResolver::new(resolver),
            policy: PlaybackPolicy::from_preferences(preferences),
            clock: Arc::new(TokioClock),
        }
    }

    /// Uses an already validated policy instead of reading preferences.
    pub fn with_policy(mut self, policy: Arc<PlaybackPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Spawns the actor on the current runtime.
    pub fn spawn(self) -> PlaybackHandle {
        self.spawn_with_task().0
    }

    /// Like [`spawn`](Self::spawn), also returning the actor task. The task
    /// finishes once every handle has been dropped.
    pub fn spawn_with_task(self) -> (PlaybackHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = watch::channel(None);
        let status = Arc::new(PlaybackStateOrchestrator::new());

        let actor = PlaybackActor::new(ActorParts {
            engine: self.engine,
            resolver: self.resolver,
            policy: self.policy,
            clock: self.clock,
            status: status.clone(),
            progress_tx,
            command_rx,
        });
        let task = tokio::spawn(actor.run());

        (PlaybackHandle::new(command_tx, status, progress_rx), task)
    }
}
