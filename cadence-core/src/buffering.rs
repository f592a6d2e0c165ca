//! Buffering episode tracking with an advisory stall signal.
//!
//! The coordinator is a plain state machine: callers feed engine states and
//! timer expiries with the current instant and act on the returned signal.
//! Arming and cancelling the actual timer is the caller's job.

use std::time::Duration;
use tokio::time::Instant;

use crate::engine::EngineState;
use crate::policy::BufferingPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferingPhase {
    Idle,
    Buffering,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferingReason {
    /// Engine is opening the source.
    Initial,
    /// Refill after an explicit seek.
    Seek,
    /// Playback ran dry mid-stream.
    Underrun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferingEpisode {
    pub id: u64,
    pub started_at: Instant,
    pub deadline: Instant,
    pub reason: BufferingReason,
    stall_signalled: bool,
}

impl BufferingEpisode {
    pub fn stall_signalled(&self) -> bool {
        self.stall_signalled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferingSignal {
    /// A new episode opened; arm a timer for `deadline`.
    Started {
        episode: u64,
        deadline: Instant,
        reason: BufferingReason,
    },
    /// The deadline passed while still buffering. Informational only.
    Stalled { episode: u64, waited: Duration },
    /// The engine reached Playing after buffering.
    Recovered {
        episode: u64,
        buffered_for: Duration,
        stalled: bool,
    },
    /// The episode ended without playing (pause, stop, error, end).
    Discarded { episode: u64 },
}

impl BufferingSignal {
    pub fn episode(&self) -> u64 {
        match self {
            BufferingSignal::Started { episode, .. }
            | BufferingSignal::Stalled { episode, .. }
            | BufferingSignal::Recovered { episode, .. }
            | BufferingSignal::Discarded { episode } => *episode,
        }
    }
}

#[derive(Debug)]
pub struct BufferingStateCoordinator {
    stall_timeout: Duration,
    phase: BufferingPhase,
    episode: Option<BufferingEpisode>,
    next_episode: u64,
    seek_pending: bool,
}

impl BufferingStateCoordinator {
    pub fn new(policy: &BufferingPolicy) -> Self {
        Self {
            stall_timeout: policy.stall_timeout,
            phase: BufferingPhase::Idle,
            episode: None,
            next_episode: 1,
            seek_pending: false,
        }
    }

    pub fn phase(&self) -> BufferingPhase {
        self.phase
    }

    pub fn current_episode(&self) -> Option<&BufferingEpisode> {
        self.episode.as_ref()
    }

    /// The next episode, if one opens, is attributed to a seek.
    pub fn note_seek(&mut self) {
        self.seek_pending = true;
    }

    pub fn on_engine_state(
        &mut self,
        state: EngineState,
        now: Instant,
    ) -> Option<BufferingSignal> {
        match state {
            EngineState::Opening | EngineState::Buffering => {
                if self.episode.is_some() {
                    return None;
                }
                Some(self.open_episode(state, now))
            }
            EngineState::Playing => {
                self.phase = BufferingPhase::Playing;
                self.seek_pending = false;
                let episode = self.episode.take()?;
                Some(BufferingSignal::Recovered {
                    episode: episode.id,
                    buffered_for: now.saturating_duration_since(episode.started_at),
                    stalled: episode.stall_signalled,
                })
            }
            EngineState::Paused
            | EngineState::Ended
            | EngineState::Error
            | EngineState::Idle => {
                if state != EngineState::Paused {
                    self.phase = BufferingPhase::Idle;
                }
                self.episode
                    .take()
                    .map(|episode| BufferingSignal::Discarded {
                        episode: episode.id,
                    })
            }
        }
    }

    /// Handles an expired stall timer. Returns `Stalled` at most once per
    /// episode; expiries for closed episodes are ignored.
    pub fn on_deadline(
        &mut self,
        episode_id: u64,
        now: Instant,
    ) -> Option<BufferingSignal> {
        let episode = self.episode.as_mut()?;
        if episode.id != episode_id || episode.stall_signalled {
            return None;
        }
        episode.stall_signalled = true;
        Some(BufferingSignal::Stalled {
            episode: episode.id,
            waited: now.saturating_duration_since(episode.started_at),
        })
    }

    /// Drops any open episode, returning its id so the caller can cancel the
    /// matching timer.
    pub fn reset(&mut self) -> Option<u64> {
        self.phase = BufferingPhase::Idle;
        self.seek_pending = false;
        self.episode.take().map(|episode| episode.id)
    }

    fn open_episode(&mut self, state: EngineState, now: Instant) -> BufferingSignal {
        let reason = if self.seek_pending {
            BufferingReason::Seek
        } else if state == EngineState::Opening
            || self.phase == BufferingPhase::Idle
        {
            BufferingReason::Initial
        } else {
            BufferingReason::Underrun
        };
        self.seek_pending = false;

        let id = self.next_episode;
        self.next_episode += 1;
        let deadline = now + self.stall_timeout;
        self.episode = Some(BufferingEpisode {
            id,
            started_at: now,
            deadline,
            reason,
            stall_signalled: false,
        });
        self.phase = BufferingPhase::Buffering;

        BufferingSignal::Started {
            episode: id,
            deadline,
            reason,
        }
    }
}
