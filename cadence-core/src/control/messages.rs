use tokio::sync::oneshot;

use crate::error::Result;
use crate::restart::{RestartReport, RestartRequest};
use crate::resume::ResumeSuccess;
use crate::types::{PlaybackRequest, PlaybackSession, Ticks};

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// Commands sent from [`PlaybackHandle`](super::PlaybackHandle) to the
/// control actor.
#[derive(Debug)]
pub(crate) enum PlaybackCommand {
    Start {
        request: PlaybackRequest,
        reply: Reply<PlaybackSession>,
    },
    Seek {
        position: Ticks,
        reply: Reply<()>,
    },
    SeekRelative {
        delta: Ticks,
        reply: Reply<()>,
    },
    Pause {
        reply: Reply<()>,
    },
    Play {
        reply: Reply<()>,
    },
    ChangeTrack {
        request: RestartRequest,
        reply: Reply<RestartReport>,
    },
    TryResume {
        target: Ticks,
        reply: Reply<ResumeSuccess>,
    },
    Stop {
        reply: Reply<()>,
    },
    Session {
        reply: oneshot::Sender<Option<PlaybackSession>>,
    },
}

/// Timer expiries posted back into the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerEvent {
    pub generation: u64,
    pub kind: TimerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    ResumeAttempt { cycle: u64, attempt: u32 },
    ResumeReady { cycle: u64 },
    BufferingStall { episode: u64 },
}

/// Caller waiting on the outcome of the running resume cycle.
#[derive(Debug)]
pub(crate) enum ResumeWaiter {
    Resume(Reply<ResumeSuccess>),
    Restart(Reply<RestartReport>),
}
