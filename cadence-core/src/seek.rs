//! Validation of a single seek against what the engine reports afterwards.

use crate::engine::EngineState;
use crate::types::Ticks;

/// Inputs for one seek evaluation. Positions are offset-corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekCheck {
    pub target: Ticks,
    /// `None` when the engine reported nothing before the wait ended.
    pub observed: Option<Ticks>,
    /// Observation from the previous attempt, used to detect progress.
    pub previous: Option<Ticks>,
    pub engine_state: EngineState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekVerdict {
    Confirmed { position: Ticks },
    /// The engine is still catching up with the request.
    NotYetSettled,
    /// The engine settled somewhere else. `drift` is observed minus target.
    Diverged { drift: Ticks },
}

#[derive(Debug, Clone, Copy)]
pub struct SeekCompletionCoordinator {
    tolerance: Ticks,
}

impl SeekCompletionCoordinator {
    pub fn new(tolerance: Ticks) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    pub fn tolerance(&self) -> Ticks {
        self.tolerance
    }

    pub fn evaluate(&self, check: &SeekCheck) -> SeekVerdict {
        let Some(observed) = check.observed else {
            return SeekVerdict::NotYetSettled;
        };

        let distance = observed.distance(check.target);
        if distance <= self.tolerance {
            return SeekVerdict::Confirmed { position: observed };
        }

        if check.engine_state.is_transitional() {
            return SeekVerdict::NotYetSettled;
        }

        if let Some(previous) = check.previous
            && distance < previous.distance(check.target)
        {
            return SeekVerdict::NotYetSettled;
        }

        SeekVerdict::Diverged {
            drift: observed - check.target,
        }
    }
}
