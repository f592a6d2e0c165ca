use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::messages::{
    PlaybackCommand, Reply, ResumeWaiter, TimerEvent, TimerKind,
};
use super::timers::TimerSlot;
use crate::buffering::{BufferingSignal, BufferingStateCoordinator};
use crate::clock::Clock;
use crate::engine::{
    EngineEvent, EngineEventSink, EngineSource, EngineState, PlayerEngine,
    TaggedEngineEvent,
};
use crate::error::{EngineError, PlaybackError, ResumeError, Result};
use crate::policy::PlaybackPolicy;
use crate::progress::ProgressSnapshot;
use crate::restart::{PlaybackRestartService, RestartReport, RestartRequest};
use crate::resume::{
    ObservationKind, ResumeDirective, ResumeFlowCoordinator, ResumeObservation,
    ResumeSuccess,
};
use crate::seek::{SeekCompletionCoordinator, SeekCheck, SeekVerdict};
use crate::source::PlaybackSourceResolver;
use crate::status::{PlaybackErrorKind, PlaybackStateOrchestrator};
use crate::types::{PlaybackRequest, PlaybackSession, PositionUpdate, Ticks};

/// State owned by one live session.
#[derive(Debug)]
struct ActiveSession {
    session: PlaybackSession,
    generation: u64,
    token: CancellationToken,
    resume: ResumeFlowCoordinator,
    buffering: BufferingStateCoordinator,
    resume_timer: TimerSlot,
    stall_timer: TimerSlot,
    waiter: Option<ResumeWaiter>,
    /// Target of the last explicit seek until the engine settles.
    user_seek: Option<Ticks>,
}

impl ActiveSession {
    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            item_id: self.session.item_id,
            position: self.session.current_position,
            is_paused: self.session.is_paused(),
        }
    }
}

/// The single writer of session state.
pub(crate) struct PlaybackActor {
    engine: Arc<dyn PlayerEngine>,
    resolver: PlaybackSourceResolver,
    restart: PlaybackRestartService,
    policy: Arc<PlaybackPolicy>,
    clock: Arc<dyn Clock>,
    status: Arc<PlaybackStateOrchestrator>,
    progress_tx: watch::Sender<Option<ProgressSnapshot>>,
    command_rx: mpsc::UnboundedReceiver<PlaybackCommand>,
    engine_tx: mpsc::UnboundedSender<TaggedEngineEvent>,
    engine_rx: mpsc::UnboundedReceiver<TaggedEngineEvent>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    user_seeks: SeekCompletionCoordinator,
    generation: u64,
    active: Option<ActiveSession>,
}

pub(crate) struct ActorParts {
    pub engine: Arc<dyn PlayerEngine>,
    pub resolver: PlaybackSourceResolver,
    pub policy: Arc<PlaybackPolicy>,
    pub clock: Arc<dyn Clock>,
    pub status: Arc<PlaybackStateOrchestrator>,
    pub progress_tx: watch::Sender<Option<ProgressSnapshot>>,
    pub command_rx: mpsc::UnboundedReceiver<PlaybackCommand>,
}

impl PlaybackActor {
    pub fn new(parts: ActorParts) -> Self {
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let restart = PlaybackRestartService::new(parts.resolver.clone());
        let user_seeks =
            SeekCompletionCoordinator::new(parts.policy.resume.position_tolerance);

        Self {
            engine: parts.engine,
            resolver: parts.resolver,
            restart,
            policy: parts.policy,
            clock: parts.clock,
            status: parts.status,
            progress_tx: parts.progress_tx,
            command_rx: parts.command_rx,
            engine_tx,
            engine_rx,
            timer_tx,
            timer_rx,
            user_seeks,
            generation: 0,
            active: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(target: "playback::control", "playback control service started");

        loop {
            tokio::select! {
                biased;

                Some(event) = self.engine_rx.recv() => {
                    self.handle_engine_event(event).await;
                }
                Some(timer) = self.timer_rx.recv() => {
                    self.handle_timer(timer).await;
                }
                command = self.command_rx.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command).await;
                }
            }
        }

        if self.active.is_some() {
            // Best effort; no caller is left to hear about failures.
            let _ = self.stop_session().await;
        }
        tracing::info!(target: "playback::control", "playback control service stopped");
    }

    async fn handle_command(&mut self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::Start { request, reply } => {
                let _ = reply.send(self.start(request).await);
            }
            PlaybackCommand::Seek { position, reply } => {
                let _ = reply.send(self.seek(position).await);
            }
            PlaybackCommand::SeekRelative { delta, reply } => {
                let result = match self.active.as_ref() {
                    Some(active) => {
                        let target = active.session.current_position + delta;
                        self.seek(target.clamp_non_negative()).await
                    }
                    None => Err(PlaybackError::NoSession),
                };
                let _ = reply.send(result);
            }
            PlaybackCommand::Pause { reply } => {
                let _ = reply.send(self.pause_or_play(false).await);
            }
            PlaybackCommand::Play { reply } => {
                let _ = reply.send(self.pause_or_play(true).await);
            }
            PlaybackCommand::ChangeTrack { request, reply } => {
                self.change_track(request, reply).await;
            }
            PlaybackCommand::TryResume { target, reply } => {
                self.try_resume(target, reply).await;
            }
            PlaybackCommand::Stop { reply } => {
                let _ = reply.send(self.stop_session().await);
            }
            PlaybackCommand::Session { reply } => {
                let _ = reply.send(
                    self.active.as_ref().map(|active| active.session.clone()),
                );
            }
        }
    }

    async fn start(&mut self, request: PlaybackRequest) -> Result<PlaybackSession> {
        if self.active.is_some() {
            tracing::debug!(
                target: "playback::control",
                "replacing running session"
            );
            // A failing stop must not block the replacement.
            let _ = self.stop_session().await;
        }

        let session = match self.resolver.resolve(&request).await {
            Ok(session) => session,
            Err(error) => {
                self.status.on_fault(PlaybackErrorKind::Source);
                return Err(error.into());
            }
        };

        self.open_session(session).await?;

        let min_resume = self.policy.resume.min_resume_position;
        let target = request.start_position;
        if target.is_positive() && target < min_resume {
            tracing::debug!(
                target: "playback::control",
                target_ticks = target.get(),
                min_ticks = min_resume.get(),
                "saved position below resume threshold; starting from the beginning"
            );
        } else if target.is_positive() {
            self.begin_resume(target, None).await;
        }

        self.publish_progress();
        self.active
            .as_ref()
            .map(|active| active.session.clone())
            .ok_or(PlaybackError::NoSession)
    }

    /// Opens `session` on the engine under a fresh generation and installs it
    /// as the active session.
    async fn open_session(&mut self, session: PlaybackSession) -> Result<()> {
        self.generation += 1;
        let generation = self.generation;
        let sink = EngineEventSink::new(generation, self.engine_tx.clone());
        let source = EngineSource {
            url: session.stream_url.clone(),
            play_method: session.play_method,
            segmented: session.protocol.is_segmented(),
        };

        tracing::info!(
            target: "playback::control",
            generation,
            item = %session.item_id,
            play_method = ?session.play_method,
            segmented = source.segmented,
            "opening playback session"
        );

        let opened = match self.engine.open(&source, sink).await {
            Ok(()) => self.engine.play().await,
            Err(error) => Err(error),
        };
        if let Err(error) = opened {
            self.engine_fault(&error, "engine failed to open session");
            if let Err(stop_error) = self.engine.stop().await {
                tracing::debug!(
                    target: "playback::control",
                    error = %stop_error,
                    "engine stop after failed open"
                );
            }
            return Err(error.into());
        }

        self.active = Some(ActiveSession {
            session,
            generation,
            token: CancellationToken::new(),
            resume: ResumeFlowCoordinator::new(self.policy.clone()),
            buffering: BufferingStateCoordinator::new(&self.policy.buffering),
            resume_timer: TimerSlot::default(),
            stall_timer: TimerSlot::default(),
            waiter: None,
            user_seek: None,
        });
        Ok(())
    }

    async fn seek(&mut self, position: Ticks) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            return Err(PlaybackError::NoSession);
        };

        let superseded = active.resume.cancel(ResumeError::Superseded);

        let position = position.clamp_non_negative();
        active.session.mark_seek();
        active.buffering.note_seek();
        active.user_seek = Some(position);
        let raw = active.session.to_raw(position);

        tracing::debug!(
            target: "playback::control",
            position_ticks = position.get(),
            raw_ticks = raw.get(),
            "user seek"
        );

        if let Some(directive) = superseded {
            self.drive_resume(directive).await;
        }

        if let Err(error) = self.engine.seek(raw).await {
            self.engine_fault(&error, "engine rejected seek");
            return Err(error.into());
        }
        Ok(())
    }

    async fn pause_or_play(&mut self, play: bool) -> Result<()> {
        if self.active.is_none() {
            return Err(PlaybackError::NoSession);
        }
        let result = if play {
            self.engine.play().await
        } else {
            self.engine.pause().await
        };
        if let Err(error) = result {
            self.engine_fault(&error, "engine rejected play/pause");
            return Err(error.into());
        }
        Ok(())
    }

    async fn try_resume(
        &mut self,
        target: Ticks,
        reply: Reply<ResumeSuccess>,
    ) {
        let Some(active) = self.active.as_ref() else {
            let _ = reply.send(Err(PlaybackError::NoSession));
            return;
        };
        if active.resume.is_active() {
            let _ = reply.send(Err(ResumeError::AlreadyInFlight.into()));
            return;
        }
        self.begin_resume(target, Some(ResumeWaiter::Resume(reply)))
            .await;
    }

    /// Starts a cycle on the active session and drives its first directive.
    async fn begin_resume(&mut self, target: Ticks, waiter: Option<ResumeWaiter>) {
        let now = self.clock.now();
        let Some(active) = self.active.as_mut() else {
            resolve_waiter(waiter, None, Err(ResumeError::NoSession));
            return;
        };

        match active.resume.try_resume(&mut active.session, target, now) {
            Ok(directive) => {
                active.waiter = waiter;
                self.drive_resume(directive).await;
            }
            Err(error) => resolve_waiter(waiter, None, Err(error)),
        }
    }

    async fn change_track(
        &mut self,
        request: RestartRequest,
        reply: Reply<RestartReport>,
    ) {
        let Some(mut previous) = self.active.take() else {
            let _ = reply.send(Err(PlaybackError::NoSession));
            return;
        };
        self.publish_progress();

        if let Some(ResumeDirective::Completed { result, .. }) =
            previous.resume.cancel(ResumeError::Cancelled)
        {
            resolve_waiter(previous.waiter.take(), Some(&previous.session), result);
        }
        previous.token.cancel();
        previous.buffering.reset();

        let plan = match self
            .restart
            .restart(self.engine.as_ref(), &previous.session, request)
            .await
        {
            Ok(plan) => plan,
            Err(error) => {
                self.status.on_fault(if matches!(error, PlaybackError::Source(_)) {
                    PlaybackErrorKind::Source
                } else {
                    PlaybackErrorKind::Engine
                });
                let _ = reply.send(Err(error));
                return;
            }
        };

        if let Err(error) = self.open_session(plan.session).await {
            let _ = reply.send(Err(error));
            return;
        }

        self.begin_resume(plan.carry_position, Some(ResumeWaiter::Restart(reply)))
            .await;
        self.publish_progress();
    }

    /// Tears the active session down. A no-op without one.
    async fn stop_session(&mut self) -> Result<()> {
        let Some(mut active) = self.active.take() else {
            tracing::debug!(target: "playback::control", "stop without a session");
            return Ok(());
        };

        if let Some(ResumeDirective::Completed { result, .. }) =
            active.resume.cancel(ResumeError::Cancelled)
        {
            resolve_waiter(active.waiter.take(), Some(&active.session), result);
        }
        active.token.cancel();
        active.buffering.reset();
        self.publish_progress();

        tracing::info!(
            target: "playback::control",
            generation = active.generation,
            item = %active.session.item_id,
            position_ticks = active.session.current_position.get(),
            "stopping playback session"
        );

        if let Err(error) = self.engine.stop().await {
            self.engine_fault(&error, "engine failed to stop");
            return Err(error.into());
        }
        self.status.on_stopped();
        Ok(())
    }

    async fn handle_engine_event(&mut self, tagged: TaggedEngineEvent) {
        let now = self.clock.now();
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if tagged.generation != active.generation {
            tracing::trace!(
                target: "playback::control",
                stale = tagged.generation,
                current = active.generation,
                "dropping event from a replaced session"
            );
            return;
        }

        let directive = match tagged.event {
            EngineEvent::StateChanged(state) => {
                let previous = active.session.engine_state;
                active.session.engine_state = state;
                tracing::debug!(
                    target: "playback::control",
                    from = ?previous,
                    to = ?state,
                    "engine state changed"
                );

                if let Some(signal) = active.buffering.on_engine_state(state, now) {
                    apply_buffering_signal(
                        active,
                        &signal,
                        self.clock.as_ref(),
                        &self.timer_tx,
                    );
                    self.status.on_buffering(&signal);
                }
                self.status.on_engine_state(state);

                match state {
                    EngineState::Playing => {
                        active.resume.on_engine_ready(&mut active.session, now)
                    }
                    EngineState::Ended | EngineState::Error => {
                        active.resume.cancel(ResumeError::Cancelled)
                    }
                    _ => None,
                }
            }
            EngineEvent::PositionChanged(raw) | EngineEvent::SeekCompleted(raw) => {
                let reported = active.session.to_reported(raw);
                let engine_state = active.session.engine_state;
                let kind = match tagged.event {
                    EngineEvent::SeekCompleted(_) => ObservationKind::SeekCompleted,
                    _ => ObservationKind::Position,
                };

                if active.resume.is_active() {
                    active.resume.on_observation(
                        &mut active.session,
                        ResumeObservation {
                            position: reported,
                            engine_state,
                            kind,
                        },
                        now,
                    )
                } else {
                    let before = active.session.current_position;
                    if let Some(target) = active.user_seek {
                        log_user_seek(
                            &self.user_seeks,
                            active,
                            target,
                            reported,
                        );
                    }
                    match active.session.observe_position(reported) {
                        PositionUpdate::Advanced if reported > before => {
                            self.status.on_progress(engine_state);
                        }
                        PositionUpdate::Ignored => {
                            tracing::trace!(
                                target: "playback::control",
                                reported_ticks = reported.get(),
                                current_ticks = active.session.current_position.get(),
                                "ignoring backwards position report"
                            );
                        }
                        PositionUpdate::Advanced | PositionUpdate::Rewound => {}
                    }
                    None
                }
            }
        };

        if let Some(directive) = directive {
            self.drive_resume(directive).await;
        }
        self.publish_progress();
    }

    async fn handle_timer(&mut self, timer: TimerEvent) {
        let now = self.clock.now();
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if timer.generation != active.generation {
            return;
        }

        let directive = match timer.kind {
            TimerKind::ResumeAttempt { cycle, attempt } => active
                .resume
                .on_attempt_deadline(&mut active.session, cycle, attempt, now),
            TimerKind::ResumeReady { cycle } => {
                active.resume.on_ready_deadline(cycle, now)
            }
            TimerKind::BufferingStall { episode } => {
                if let Some(signal) = active.buffering.on_deadline(episode, now) {
                    apply_buffering_signal(
                        active,
                        &signal,
                        self.clock.as_ref(),
                        &self.timer_tx,
                    );
                    self.status.on_buffering(&signal);
                }
                None
            }
        };

        if let Some(directive) = directive {
            self.drive_resume(directive).await;
        }
        self.publish_progress();
    }

    /// Carries out a directive from the resume flow.
    async fn drive_resume(&mut self, directive: ResumeDirective) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        match directive {
            ResumeDirective::Seek {
                cycle,
                attempt,
                raw_target,
                deadline,
            } => {
                active.buffering.note_seek();
                active.resume_timer.arm(
                    self.clock.as_ref(),
                    &active.token,
                    &self.timer_tx,
                    deadline,
                    active.generation,
                    TimerKind::ResumeAttempt { cycle, attempt },
                );
                tracing::debug!(
                    target: "playback::resume",
                    cycle,
                    attempt,
                    raw_ticks = raw_target.get(),
                    "seeking for resume"
                );

                if let Err(error) = self.engine.seek(raw_target).await {
                    self.engine_fault(&error, "engine rejected resume seek");
                    let Some(active) = self.active.as_mut() else {
                        return;
                    };
                    active.resume_timer.cancel();
                    if active.resume.cancel(ResumeError::Cancelled).is_some() {
                        fail_waiter(active.waiter.take(), error.into());
                    }
                }
            }
            ResumeDirective::AwaitReady { cycle, deadline } => {
                active.resume_timer.arm(
                    self.clock.as_ref(),
                    &active.token,
                    &self.timer_tx,
                    deadline,
                    active.generation,
                    TimerKind::ResumeReady { cycle },
                );
            }
            ResumeDirective::Completed { cycle, result } => {
                active.resume_timer.cancel();
                if let Err(error) = &result {
                    self.status.on_resume_failed(error);
                }
                tracing::debug!(
                    target: "playback::resume",
                    cycle,
                    ok = result.is_ok(),
                    "resume cycle finished"
                );
                resolve_waiter(active.waiter.take(), Some(&active.session), result);
            }
        }
    }

    fn engine_fault(&self, error: &EngineError, message: &'static str) {
        tracing::error!(target: "playback::control", %error, "{message}");
        self.status.on_fault(PlaybackErrorKind::Engine);
    }

    fn publish_progress(&self) {
        let snapshot = self.active.as_ref().map(ActiveSession::snapshot);
        self.progress_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

fn apply_buffering_signal(
    active: &mut ActiveSession,
    signal: &BufferingSignal,
    clock: &dyn Clock,
    timer_tx: &mpsc::UnboundedSender<TimerEvent>,
) {
    match *signal {
        BufferingSignal::Started {
            episode,
            deadline,
            reason,
        } => {
            tracing::debug!(
                target: "playback::buffering",
                episode,
                ?reason,
                "buffering started"
            );
            active.stall_timer.arm(
                clock,
                &active.token,
                timer_tx,
                deadline,
                active.generation,
                TimerKind::BufferingStall { episode },
            );
        }
        BufferingSignal::Stalled { episode, waited } => {
            tracing::warn!(
                target: "playback::buffering",
                episode,
                waited_ms = waited.as_millis() as u64,
                "buffering stalled"
            );
        }
        BufferingSignal::Recovered {
            episode,
            buffered_for,
            stalled,
        } => {
            active.stall_timer.cancel();
            tracing::debug!(
                target: "playback::buffering",
                episode,
                buffered_ms = buffered_for.as_millis() as u64,
                stalled,
                "buffering recovered"
            );
        }
        BufferingSignal::Discarded { episode } => {
            active.stall_timer.cancel();
            tracing::debug!(
                target: "playback::buffering",
                episode,
                "buffering episode discarded"
            );
        }
    }
}

fn log_user_seek(
    seeks: &SeekCompletionCoordinator,
    active: &mut ActiveSession,
    target: Ticks,
    reported: Ticks,
) {
    let verdict = seeks.evaluate(&SeekCheck {
        target,
        observed: Some(reported),
        previous: None,
        engine_state: active.session.engine_state,
    });
    match verdict {
        SeekVerdict::NotYetSettled => {}
        SeekVerdict::Confirmed { position } => {
            active.user_seek = None;
            tracing::debug!(
                target: "playback::control",
                target_ticks = target.get(),
                position_ticks = position.get(),
                "user seek landed"
            );
        }
        SeekVerdict::Diverged { drift } => {
            active.user_seek = None;
            tracing::info!(
                target: "playback::control",
                target_ticks = target.get(),
                drift_ticks = drift.get(),
                "user seek landed away from target"
            );
        }
    }
}

/// Answers whoever waits on a finished resume cycle.
fn resolve_waiter(
    waiter: Option<ResumeWaiter>,
    session: Option<&PlaybackSession>,
    result: std::result::Result<ResumeSuccess, ResumeError>,
) {
    let Some(waiter) = waiter else {
        return;
    };
    match waiter {
        ResumeWaiter::Resume(reply) => {
            let _ = reply.send(result.map_err(PlaybackError::from));
        }
        ResumeWaiter::Restart(reply) => {
            let report = match (session, result) {
                (Some(session), resume) => Ok(RestartReport {
                    session: session.clone(),
                    resume,
                }),
                (None, Err(error)) => Err(error.into()),
                (None, Ok(_)) => Err(PlaybackError::NoSession),
            };
            let _ = reply.send(report);
        }
    }
}

fn fail_waiter(waiter: Option<ResumeWaiter>, error: PlaybackError) {
    match waiter {
        Some(ResumeWaiter::Resume(reply)) => {
            let _ = reply.send(Err(error));
        }
        Some(ResumeWaiter::Restart(reply)) => {
            let _ = reply.send(Err(error));
        }
        None => {}
    }
}
