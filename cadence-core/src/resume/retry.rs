//! One resume cycle: seek, wait, compare, then retry, accept or give up.

use tokio::time::Instant;

use super::attempt::{
    ObservationKind, ResumeAttempt, ResumeFailureReason, ResumeObservation,
    ResumeSuccess, RetryStep,
};
use crate::engine::EngineState;
use crate::policy::ResumePolicy;
use crate::seek::{SeekCompletionCoordinator, SeekCheck, SeekVerdict};
use crate::types::{StreamProtocol, Ticks};

#[derive(Debug)]
pub struct ResumeRetryCoordinator {
    policy: ResumePolicy,
    seek: SeekCompletionCoordinator,
    protocol: StreamProtocol,
    attempt: ResumeAttempt,
    /// Attempt number currently waiting on the engine.
    awaiting: Option<u32>,
    /// Latest report of the current attempt that could not settle it on its
    /// own: a playhead tick, or a report while the engine was still loading.
    pending: Option<ResumeObservation>,
}

impl ResumeRetryCoordinator {
    /// `started_at` is when the cycle was requested; the total timeout is
    /// charged from there, including any wait for engine readiness.
    pub fn new(
        policy: &ResumePolicy,
        protocol: StreamProtocol,
        target: Ticks,
        started_at: Instant,
    ) -> Self {
        Self {
            policy: policy.clone(),
            seek: SeekCompletionCoordinator::new(policy.position_tolerance),
            protocol,
            attempt: ResumeAttempt::new(target, started_at),
            awaiting: None,
            pending: None,
        }
    }

    pub fn attempt(&self) -> &ResumeAttempt {
        &self.attempt
    }

    pub fn awaiting(&self) -> Option<u32> {
        self.awaiting
    }

    /// Issues the first seek.
    pub fn begin(&mut self, now: Instant) -> RetryStep {
        self.issue(now)
    }

    /// Feeds a position or seek-completion report.
    ///
    /// Any report on target confirms the attempt. Off-target playhead ticks
    /// may predate the seek, and off-target reports while the engine is
    /// still opening or buffering are not final either; both are kept for
    /// when the attempt deadline passes. Only a completed seek on a loaded
    /// engine ends an attempt early.
    pub fn observe(
        &mut self,
        observation: ResumeObservation,
        now: Instant,
    ) -> Option<RetryStep> {
        self.awaiting?;

        let on_target = observation.position.distance(self.attempt.target)
            <= self.seek.tolerance();
        if !on_target
            && (observation.kind == ObservationKind::Position
                || observation.engine_state.is_transitional())
        {
            self.pending = Some(observation);
            return None;
        }

        Some(self.settle(
            Some(observation.position),
            observation.engine_state,
            now,
        ))
    }

    /// Handles the deadline of `attempt`. Stale deadlines return `None`.
    pub fn attempt_timed_out(
        &mut self,
        attempt: u32,
        engine_state: EngineState,
        now: Instant,
    ) -> Option<RetryStep> {
        if self.awaiting != Some(attempt) {
            return None;
        }

        match self.pending.take() {
            Some(observation) => Some(self.settle(
                Some(observation.position),
                observation.engine_state,
                now,
            )),
            None => Some(self.settle(None, engine_state, now)),
        }
    }

    fn issue(&mut self, now: Instant) -> RetryStep {
        self.attempt.attempt_count += 1;
        self.pending = None;
        let attempt = self.attempt.attempt_count;
        self.awaiting = Some(attempt);

        let per_attempt = now + self.policy.per_attempt_timeout;
        let overall = self.attempt.started_at + self.policy.total_timeout;
        RetryStep::Seek {
            attempt,
            target: self.attempt.target,
            deadline: per_attempt.min(overall),
        }
    }

    fn settle(
        &mut self,
        observed: Option<Ticks>,
        engine_state: EngineState,
        now: Instant,
    ) -> RetryStep {
        let verdict = self.seek.evaluate(&SeekCheck {
            target: self.attempt.target,
            observed,
            previous: self.attempt.last_observed,
            engine_state,
        });
        if observed.is_some() {
            self.attempt.last_observed = observed;
        }

        tracing::debug!(
            target: "playback::resume",
            attempt = self.attempt.attempt_count,
            target_ticks = self.attempt.target.get(),
            observed = ?observed.map(Ticks::get),
            ?verdict,
            "resume attempt evaluated"
        );

        match verdict {
            SeekVerdict::Confirmed { position } => {
                self.succeed(position, false)
            }
            SeekVerdict::Diverged { drift } => {
                match observed {
                    Some(position) if self.keyframe_aligned(position, drift) => {
                        self.succeed(position, true)
                    }
                    _ => self.retry_or_fail(ResumeFailureReason::Stuck, now),
                }
            }
            SeekVerdict::NotYetSettled => {
                self.retry_or_fail(ResumeFailureReason::Timeout, now)
            }
        }
    }

    fn retry_or_fail(
        &mut self,
        reason: ResumeFailureReason,
        now: Instant,
    ) -> RetryStep {
        let attempts_left =
            self.attempt.attempt_count < self.policy.max_attempts;
        let time_left = self.attempt.elapsed(now) < self.policy.total_timeout;

        if attempts_left && time_left {
            return self.issue(now);
        }

        self.awaiting = None;
        RetryStep::Failed {
            reason,
            attempts: self.attempt.attempt_count,
            last_observed: self.attempt.last_observed,
        }
    }

    fn succeed(&mut self, position: Ticks, keyframe_aligned: bool) -> RetryStep {
        self.awaiting = None;
        RetryStep::Succeeded(ResumeSuccess {
            target: self.attempt.target,
            position,
            attempts: self.attempt.attempt_count,
            keyframe_aligned,
        })
    }

    /// Segmented servers can only start at segment boundaries and sometimes
    /// apply the manifest offset twice or not at all. A divergence is
    /// accepted when it stays inside the snap window and either lands on a
    /// segment boundary or equals the manifest offset, both within
    /// tolerance.
    fn keyframe_aligned(&self, observed: Ticks, drift: Ticks) -> bool {
        let StreamProtocol::SegmentedStreaming {
            manifest_offset,
            segment_duration,
        } = self.protocol
        else {
            return false;
        };

        if drift.abs() > self.policy.keyframe_snap_window {
            return false;
        }

        let tolerance = self.seek.tolerance();
        if manifest_offset.is_positive()
            && drift.abs().distance(manifest_offset) <= tolerance
        {
            return true;
        }

        match segment_duration.filter(|segment| segment.is_positive()) {
            Some(segment) => {
                let raw = (observed - manifest_offset).get();
                let into_segment = raw.rem_euclid(segment.get());
                let to_boundary = into_segment.min(segment.get() - into_segment);
                to_boundary <= tolerance.get()
            }
            None => false,
        }
    }
}
