use std::time::Duration;
use tokio::time::Instant;

use crate::engine::EngineState;
use crate::types::Ticks;

/// Progress of one resume cycle. Created per cycle, dropped on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeAttempt {
    pub target: Ticks,
    pub attempt_count: u32,
    pub started_at: Instant,
    pub last_observed: Option<Ticks>,
}

impl ResumeAttempt {
    pub fn new(target: Ticks, started_at: Instant) -> Self {
        Self {
            target,
            attempt_count: 0,
            started_at,
            last_observed: None,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}

/// Which engine notification produced an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    /// Periodic playhead report. May still describe the position from
    /// before the pending seek.
    Position,
    /// The engine finished a seek.
    SeekCompleted,
}

/// Offset-corrected engine report fed into a running cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeObservation {
    pub position: Ticks,
    pub engine_state: EngineState,
    pub kind: ObservationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFailureReason {
    /// The engine never settled before attempts or time ran out.
    Timeout,
    /// The engine settled away from the target every time.
    Stuck,
}

/// Successful landing of a resume cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeSuccess {
    pub target: Ticks,
    pub position: Ticks,
    pub attempts: u32,
    /// Accepted because the drift matched segment/keyframe alignment.
    pub keyframe_aligned: bool,
}

/// What the retry coordinator wants done next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Seek to `target` (absolute) and wait until `deadline`.
    Seek {
        attempt: u32,
        target: Ticks,
        deadline: Instant,
    },
    Succeeded(ResumeSuccess),
    Failed {
        reason: ResumeFailureReason,
        attempts: u32,
        last_observed: Option<Ticks>,
    },
}
