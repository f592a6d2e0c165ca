//! Resume acceptance and completion for a session.
//!
//! Owns at most one cycle at a time. A cycle requested before the engine is
//! ready is parked until the first Playing report, bounded by the total
//! resume timeout.

use std::sync::Arc;
use tokio::time::Instant;

use super::attempt::{
    ResumeFailureReason, ResumeObservation, ResumeSuccess, RetryStep,
};
use super::retry::ResumeRetryCoordinator;
use crate::engine::EngineState;
use crate::error::ResumeError;
use crate::policy::PlaybackPolicy;
use crate::types::{PlaybackSession, Ticks};

/// Side effect requested by the flow coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeDirective {
    /// Seek the engine to `raw_target` and arm the attempt timer.
    Seek {
        cycle: u64,
        attempt: u32,
        raw_target: Ticks,
        deadline: Instant,
    },
    /// Arm the readiness timer; the first seek waits for Playing.
    AwaitReady { cycle: u64, deadline: Instant },
    Completed {
        cycle: u64,
        result: Result<ResumeSuccess, ResumeError>,
    },
}

#[derive(Debug)]
enum CycleState {
    AwaitingReady { deadline: Instant },
    Running(ResumeRetryCoordinator),
}

#[derive(Debug)]
struct ActiveCycle {
    id: u64,
    target: Ticks,
    /// The total timeout is charged from here.
    requested_at: Instant,
    state: CycleState,
}

#[derive(Debug)]
pub struct ResumeFlowCoordinator {
    policy: Arc<PlaybackPolicy>,
    active: Option<ActiveCycle>,
    next_cycle: u64,
}

impl ResumeFlowCoordinator {
    pub fn new(policy: Arc<PlaybackPolicy>) -> Self {
        Self {
            policy,
            active: None,
            next_cycle: 1,
        }
    }

    pub fn active_target(&self) -> Option<Ticks> {
        self.active.as_ref().map(|cycle| cycle.target)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Starts a resume cycle towards `target` (absolute, offset-corrected).
    ///
    /// A second call while a cycle is running is rejected rather than
    /// interleaved.
    pub fn try_resume(
        &mut self,
        session: &mut PlaybackSession,
        target: Ticks,
        now: Instant,
    ) -> Result<ResumeDirective, ResumeError> {
        if self.active.is_some() {
            return Err(ResumeError::AlreadyInFlight);
        }

        let id = self.next_cycle;
        self.next_cycle += 1;
        let target = target.clamp_non_negative();

        tracing::info!(
            target: "playback::resume",
            cycle = id,
            item = %session.item_id,
            target_ticks = target.get(),
            engine_state = ?session.engine_state,
            "resume requested"
        );

        if target.is_zero() {
            session.commit_position(Ticks::ZERO);
            return Ok(ResumeDirective::Completed {
                cycle: id,
                result: Ok(ResumeSuccess {
                    target,
                    position: Ticks::ZERO,
                    attempts: 0,
                    keyframe_aligned: false,
                }),
            });
        }

        if matches!(
            session.engine_state,
            EngineState::Playing | EngineState::Paused
        ) {
            let mut retry = ResumeRetryCoordinator::new(
                &self.policy.resume,
                session.protocol,
                target,
                now,
            );
            let step = retry.begin(now);
            self.active = Some(ActiveCycle {
                id,
                target,
                requested_at: now,
                state: CycleState::Running(retry),
            });
            return Ok(self.apply(session, id, step));
        }

        let deadline = now + self.policy.resume.total_timeout;
        self.active = Some(ActiveCycle {
            id,
            target,
            requested_at: now,
            state: CycleState::AwaitingReady { deadline },
        });
        Ok(ResumeDirective::AwaitReady {
            cycle: id,
            deadline,
        })
    }

    /// The engine reported Playing; a parked cycle begins seeking. Time
    /// already spent waiting counts against the total timeout.
    pub fn on_engine_ready(
        &mut self,
        session: &mut PlaybackSession,
        now: Instant,
    ) -> Option<ResumeDirective> {
        let cycle = self.active.as_mut()?;
        if !matches!(cycle.state, CycleState::AwaitingReady { .. }) {
            return None;
        }

        let mut retry = ResumeRetryCoordinator::new(
            &self.policy.resume,
            session.protocol,
            cycle.target,
            cycle.requested_at,
        );
        let step = retry.begin(now);
        cycle.state = CycleState::Running(retry);
        let id = cycle.id;
        Some(self.apply(session, id, step))
    }

    pub fn on_observation(
        &mut self,
        session: &mut PlaybackSession,
        observation: ResumeObservation,
        now: Instant,
    ) -> Option<ResumeDirective> {
        let cycle = self.active.as_mut()?;
        let CycleState::Running(retry) = &mut cycle.state else {
            return None;
        };
        let step = retry.observe(observation, now)?;
        let id = cycle.id;
        Some(self.apply(session, id, step))
    }

    pub fn on_attempt_deadline(
        &mut self,
        session: &mut PlaybackSession,
        cycle_id: u64,
        attempt: u32,
        now: Instant,
    ) -> Option<ResumeDirective> {
        let cycle = self.active.as_mut().filter(|c| c.id == cycle_id)?;
        let CycleState::Running(retry) = &mut cycle.state else {
            return None;
        };
        let step = retry.attempt_timed_out(attempt, session.engine_state, now)?;
        Some(self.apply(session, cycle_id, step))
    }

    /// The engine never became ready in time.
    pub fn on_ready_deadline(
        &mut self,
        cycle_id: u64,
        now: Instant,
    ) -> Option<ResumeDirective> {
        let cycle = self.active.as_ref().filter(|c| c.id == cycle_id)?;
        let CycleState::AwaitingReady { deadline } = cycle.state else {
            return None;
        };
        if now < deadline {
            return None;
        }

        let target = cycle.target;
        self.active = None;
        tracing::warn!(
            target: "playback::resume",
            cycle = cycle_id,
            target_ticks = target.get(),
            "engine never became ready for resume"
        );
        Some(ResumeDirective::Completed {
            cycle: cycle_id,
            result: Err(ResumeError::Timeout {
                target,
                attempts: 0,
                last_observed: None,
            }),
        })
    }

    /// Abandons the running cycle, if any.
    pub fn cancel(&mut self, reason: ResumeError) -> Option<ResumeDirective> {
        let cycle = self.active.take()?;
        tracing::debug!(
            target: "playback::resume",
            cycle = cycle.id,
            %reason,
            "resume cycle cancelled"
        );
        Some(ResumeDirective::Completed {
            cycle: cycle.id,
            result: Err(reason),
        })
    }

    fn apply(
        &mut self,
        session: &mut PlaybackSession,
        cycle: u64,
        step: RetryStep,
    ) -> ResumeDirective {
        match step {
            RetryStep::Seek {
                attempt,
                target,
                deadline,
            } => {
                session.mark_seek();
                ResumeDirective::Seek {
                    cycle,
                    attempt,
                    raw_target: session.to_raw(target),
                    deadline,
                }
            }
            RetryStep::Succeeded(success) => {
                self.active = None;
                session.commit_position(success.position);
                tracing::info!(
                    target: "playback::resume",
                    cycle,
                    attempts = success.attempts,
                    position = success.position.get(),
                    keyframe_aligned = success.keyframe_aligned,
                    "resume confirmed"
                );
                ResumeDirective::Completed {
                    cycle,
                    result: Ok(success),
                }
            }
            RetryStep::Failed {
                reason,
                attempts,
                last_observed,
            } => {
                let target = self
                    .active
                    .take()
                    .map(|c| c.target)
                    .unwrap_or_default();
                let error = match reason {
                    ResumeFailureReason::Timeout => ResumeError::Timeout {
                        target,
                        attempts,
                        last_observed,
                    },
                    ResumeFailureReason::Stuck => ResumeError::Stuck {
                        target,
                        attempts,
                        last_observed,
                    },
                };
                tracing::warn!(
                    target: "playback::resume",
                    cycle,
                    %error,
                    "resume failed; playback continues where the engine landed"
                );
                ResumeDirective::Completed {
                    cycle,
                    result: Err(error),
                }
            }
        }
    }
}
