mod support;

use futures::StreamExt;
use std::time::Duration;

use cadence_core::error::{EngineError, PlaybackError, ResumeError};
use cadence_core::prelude::*;
use support::{
    ScriptedEngine, StaticResolver, advance, request, settle, spawn, spawn_with,
    tunables,
};

#[tokio::test(start_paused = true)]
async fn start_resumes_saved_position_once_engine_is_ready() {
    let harness = spawn(
        ScriptedEngine::with_seek_script(|raw| Some(Ticks(raw.get() + 10_000))),
        StaticResolver::progressive(),
    );

    let session = harness
        .handle
        .start(request(Ticks(600_000)))
        .await
        .expect("session starts");
    assert_eq!(session.start_position, Ticks(600_000));
    settle().await;

    let session = harness
        .handle
        .session()
        .await
        .expect("service alive")
        .expect("active session");
    assert_eq!(session.current_position, Ticks(610_000));
    assert_eq!(harness.engine.seeks(), vec![Ticks(600_000)]);
    assert_eq!(harness.handle.status(), PlaybackStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn try_resume_confirms_within_tolerance_after_one_attempt() {
    let harness = spawn(
        ScriptedEngine::with_seek_script(|raw| Some(Ticks(raw.get() + 10_000))),
        StaticResolver::progressive(),
    );
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;
    assert!(harness.engine.seeks().is_empty());

    let success = harness
        .handle
        .try_resume(Ticks(600_000))
        .await
        .expect("resume lands");

    assert_eq!(success.attempts, 1);
    assert_eq!(success.position, Ticks(610_000));
    assert!(!success.keyframe_aligned);
    let snapshot = harness.handle.progress_snapshot().expect("snapshot");
    assert_eq!(snapshot.position, Ticks(610_000));
    assert!(!snapshot.is_paused);
}

#[tokio::test(start_paused = true)]
async fn segmented_resume_applies_manifest_offset_both_ways() {
    let harness = spawn(
        ScriptedEngine::with_seek_script(|raw| Some(Ticks(raw.get() + 200))),
        StaticResolver::segmented(Ticks(20_000)),
    );
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;

    let success = harness
        .handle
        .try_resume(Ticks(600_000))
        .await
        .expect("resume lands");

    assert_eq!(harness.engine.seeks(), vec![Ticks(580_000)]);
    assert_eq!(success.attempts, 1);
    assert_eq!(success.position, Ticks(600_200));
    assert!(harness.engine.opened()[0].segmented);

    // Later raw reports keep being shifted by the offset.
    harness.engine.emit_position(Ticks(600_000));
    settle().await;
    assert_eq!(
        harness.handle.progress_snapshot().expect("snapshot").position,
        Ticks(620_000)
    );
}

#[tokio::test(start_paused = true)]
async fn engine_stuck_at_zero_fails_as_stuck_after_all_attempts() {
    let harness = spawn(
        ScriptedEngine::with_seek_script(|_| Some(Ticks::ZERO)),
        StaticResolver::progressive(),
    );
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;

    let error = harness
        .handle
        .try_resume(Ticks(600_000))
        .await
        .expect_err("resume cannot land");

    assert!(matches!(
        error,
        PlaybackError::Resume(ResumeError::Stuck {
            target: Ticks(600_000),
            attempts: 3,
            last_observed: Some(Ticks(0)),
        })
    ));
    assert_eq!(harness.engine.seeks().len(), 3);
    assert_eq!(
        harness.handle.status(),
        PlaybackStatus::Error(PlaybackErrorKind::ResumeStuck)
    );
    // Playback itself keeps going.
    assert!(harness.handle.session().await.expect("alive").is_some());
}

#[tokio::test(start_paused = true)]
async fn silent_engine_times_out_after_all_attempts() {
    let harness = spawn(
        ScriptedEngine::with_seek_script(|_| None),
        StaticResolver::progressive(),
    );
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;

    let started = tokio::time::Instant::now();
    let error = harness
        .handle
        .try_resume(Ticks(600_000))
        .await
        .expect_err("resume times out");

    assert!(matches!(
        error,
        PlaybackError::Resume(ResumeError::Timeout {
            attempts: 3,
            last_observed: None,
            ..
        })
    ));
    assert_eq!(harness.engine.seeks().len(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(9));
    assert_eq!(
        harness.handle.status(),
        PlaybackStatus::Error(PlaybackErrorKind::ResumeTimeout)
    );
}

#[tokio::test(start_paused = true)]
async fn second_resume_is_rejected_while_one_is_in_flight() {
    let harness = spawn(
        ScriptedEngine::with_seek_script(|_| None),
        StaticResolver::progressive(),
    );
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;

    let first = tokio::spawn({
        let handle = harness.handle.clone();
        async move { handle.try_resume(Ticks(600_000)).await }
    });
    settle().await;

    assert_eq!(
        harness.handle.try_resume(Ticks(700_000)).await,
        Err(PlaybackError::Resume(ResumeError::AlreadyInFlight))
    );

    harness.handle.stop().await.expect("stops");
    assert_eq!(
        first.await.expect("task joins"),
        Err(PlaybackError::Resume(ResumeError::Cancelled))
    );
}

#[tokio::test(start_paused = true)]
async fn user_seek_supersedes_running_resume() {
    let harness = spawn(
        ScriptedEngine::with_seek_script(|_| None),
        StaticResolver::progressive(),
    );
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;

    let resume = tokio::spawn({
        let handle = harness.handle.clone();
        async move { handle.try_resume(Ticks(600_000)).await }
    });
    settle().await;

    harness.handle.seek(Ticks(300_000)).await.expect("seek accepted");
    assert_eq!(
        resume.await.expect("task joins"),
        Err(PlaybackError::Resume(ResumeError::Superseded))
    );
    assert_eq!(harness.engine.seeks(), vec![Ticks(600_000), Ticks(300_000)]);

    // No stray attempt timer fires later.
    advance(Duration::from_secs(30)).await;
    assert_eq!(harness.engine.seeks().len(), 2);
    assert_eq!(harness.handle.status(), PlaybackStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn stop_twice_is_a_quiet_no_op() {
    let harness = spawn(ScriptedEngine::accurate(), StaticResolver::progressive());
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;

    harness.handle.stop().await.expect("first stop");
    harness.handle.stop().await.expect("second stop");

    assert_eq!(harness.engine.stops(), 1);
    assert_eq!(harness.handle.status(), PlaybackStatus::Idle);
    assert_eq!(harness.handle.session().await.expect("alive"), None);
    assert_eq!(harness.handle.progress_snapshot(), None);
}

#[tokio::test(start_paused = true)]
async fn stop_without_session_succeeds() {
    let harness = spawn(ScriptedEngine::accurate(), StaticResolver::progressive());
    harness.handle.stop().await.expect("no-op stop");
    assert_eq!(harness.engine.stops(), 0);
}

#[tokio::test(start_paused = true)]
async fn buffering_stall_is_signalled_at_most_once() {
    let harness = spawn(
        ScriptedEngine::accurate().settling_in(EngineState::Buffering),
        StaticResolver::progressive(),
    );
    let mut transitions = harness.handle.subscribe_status();

    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;
    assert_eq!(harness.handle.status(), PlaybackStatus::Buffering);

    advance(Duration::from_secs(8)).await;
    assert_eq!(harness.handle.status(), PlaybackStatus::Stalled);

    advance(Duration::from_secs(30)).await;
    harness.engine.emit_state(EngineState::Buffering);
    settle().await;
    assert_eq!(harness.handle.status(), PlaybackStatus::Stalled);

    harness.engine.emit_state(EngineState::Playing);
    settle().await;

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(transitions.next().await.expect("transition"));
    }
    assert_eq!(
        seen,
        vec![
            PlaybackStatus::Buffering,
            PlaybackStatus::Stalled,
            PlaybackStatus::Playing,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn events_from_a_replaced_session_are_dropped() {
    let harness = spawn(ScriptedEngine::accurate(), StaticResolver::progressive());
    harness.handle.start(request(Ticks::ZERO)).await.expect("first");
    settle().await;
    harness.handle.start(request(Ticks::ZERO)).await.expect("second");
    settle().await;
    assert_eq!(harness.engine.stops(), 1);

    let stale = harness.engine.sink(0);
    assert!(stale.position_changed(Ticks::from_secs(300)));
    settle().await;

    let session = harness
        .handle
        .session()
        .await
        .expect("alive")
        .expect("session");
    assert_eq!(session.current_position, Ticks::ZERO);
}

#[tokio::test(start_paused = true)]
async fn positions_never_move_backwards_without_a_seek() {
    let harness = spawn(ScriptedEngine::accurate(), StaticResolver::progressive());
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;

    harness.engine.emit_position(Ticks::from_secs(60));
    harness.engine.emit_position(Ticks::from_secs(59));
    settle().await;
    assert_eq!(
        harness.handle.progress_snapshot().expect("snapshot").position,
        Ticks::from_secs(60)
    );

    harness
        .handle
        .seek_relative(Ticks::from_secs(-90))
        .await
        .expect("rewind");
    settle().await;
    assert_eq!(harness.engine.seeks(), vec![Ticks::ZERO]);
    assert_eq!(
        harness.handle.progress_snapshot().expect("snapshot").position,
        Ticks::ZERO
    );

    harness
        .handle
        .seek_relative(Ticks::from_secs(30))
        .await
        .expect("fast forward");
    assert_eq!(
        harness.engine.seeks(),
        vec![Ticks::ZERO, Ticks::from_secs(30)]
    );
}

#[tokio::test(start_paused = true)]
async fn pause_and_play_pass_through_to_the_engine() {
    let harness = spawn(ScriptedEngine::accurate(), StaticResolver::progressive());
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;
    harness.engine.emit_position(Ticks::from_secs(60));

    harness.handle.pause().await.expect("pause");
    settle().await;
    assert_eq!(harness.handle.status(), PlaybackStatus::Paused);
    assert!(harness.handle.progress_snapshot().expect("snapshot").is_paused);

    harness.handle.play().await.expect("play");
    settle().await;
    assert_eq!(harness.handle.status(), PlaybackStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn engine_failures_surface_as_engine_errors() {
    let harness = spawn(
        ScriptedEngine::accurate().failing_seeks(),
        StaticResolver::progressive(),
    );
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;

    assert_eq!(
        harness.handle.seek(Ticks(100)).await,
        Err(PlaybackError::Engine(EngineError::Command(
            "seek refused".into()
        )))
    );
    assert_eq!(
        harness.handle.status(),
        PlaybackStatus::Error(PlaybackErrorKind::Engine)
    );
}

#[tokio::test(start_paused = true)]
async fn saved_positions_below_threshold_start_from_the_beginning() {
    let harness = spawn_with(
        ScriptedEngine::accurate(),
        StaticResolver::progressive(),
        PlaybackTunables {
            min_resume_position_ticks: Ticks::from_secs(5).get(),
            ..tunables()
        },
    );
    harness
        .handle
        .start(request(Ticks::from_secs(2)))
        .await
        .expect("starts");
    settle().await;

    assert!(harness.engine.seeks().is_empty());
    assert_eq!(harness.handle.status(), PlaybackStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn commands_without_a_session_are_rejected() {
    let harness = spawn(ScriptedEngine::accurate(), StaticResolver::progressive());
    assert_eq!(
        harness.handle.seek(Ticks(1)).await,
        Err(PlaybackError::NoSession)
    );
    assert_eq!(
        harness.handle.try_resume(Ticks(1)).await,
        Err(PlaybackError::NoSession)
    );
    assert_eq!(harness.handle.pause().await, Err(PlaybackError::NoSession));
}

#[tokio::test(start_paused = true)]
async fn playhead_ticks_during_a_slow_seek_do_not_fail_the_resume() {
    let harness = spawn(
        ScriptedEngine::accurate()
            .ticking_from_old_position()
            .completing_after(Duration::from_millis(500)),
        StaticResolver::progressive(),
    );
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;
    harness.engine.emit_position(Ticks::from_secs(5));
    settle().await;

    let success = harness
        .handle
        .try_resume(Ticks(600_000))
        .await
        .expect("resume lands once the seek completes");

    assert_eq!(success.attempts, 1);
    assert_eq!(success.position, Ticks(600_000));
    assert_eq!(harness.engine.seeks(), vec![Ticks(600_000)]);
    assert_eq!(harness.handle.status(), PlaybackStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn stale_tick_ahead_of_an_inline_completion_is_ignored() {
    let harness = spawn(
        ScriptedEngine::accurate().ticking_from_old_position(),
        StaticResolver::progressive(),
    );
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;
    harness.engine.emit_position(Ticks::from_secs(5));
    settle().await;

    let success = harness
        .handle
        .try_resume(Ticks(600_000))
        .await
        .expect("resume lands");

    assert_eq!(success.attempts, 1);
    assert_eq!(harness.engine.seeks().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn time_spent_waiting_for_the_engine_counts_against_the_resume_budget() {
    let harness = spawn(
        ScriptedEngine::with_seek_script(|_| None)
            .settling_in(EngineState::Buffering),
        StaticResolver::progressive(),
    );
    harness
        .handle
        .start(request(Ticks(600_000)))
        .await
        .expect("starts");
    settle().await;
    assert!(harness.engine.seeks().is_empty());

    // Twelve seconds of budget; ten go to buffering.
    advance(Duration::from_secs(10)).await;
    harness.engine.emit_state(EngineState::Playing);
    settle().await;
    assert_eq!(harness.engine.seeks(), vec![Ticks(600_000)]);

    advance(Duration::from_millis(1_999)).await;
    assert_ne!(
        harness.handle.status(),
        PlaybackStatus::Error(PlaybackErrorKind::ResumeTimeout)
    );

    advance(Duration::from_millis(1)).await;
    assert_eq!(
        harness.handle.status(),
        PlaybackStatus::Error(PlaybackErrorKind::ResumeTimeout)
    );
    assert_eq!(harness.engine.seeks().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn segmented_resume_accepts_a_snap_to_the_previous_segment_boundary() {
    let segment = Ticks::from_secs(6);
    let harness = spawn(
        ScriptedEngine::with_seek_script(move |raw| {
            Some(Ticks(raw.get() / segment.get() * segment.get()))
        }),
        StaticResolver::segmented_in(Ticks(20_000), segment),
    );
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;

    let success = harness
        .handle
        .try_resume(Ticks::from_secs(100))
        .await
        .expect("keyframe snap is accepted");

    assert_eq!(harness.engine.seeks(), vec![Ticks(999_980_000)]);
    assert_eq!(success.attempts, 1);
    assert!(success.keyframe_aligned);
    assert_eq!(success.position, Ticks(960_020_000));
    assert_eq!(harness.handle.status(), PlaybackStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn playback_progress_clears_a_failed_resume_status() {
    let harness = spawn(
        ScriptedEngine::with_seek_script(|_| Some(Ticks::ZERO)),
        StaticResolver::progressive(),
    );
    harness.handle.start(request(Ticks::ZERO)).await.expect("starts");
    settle().await;

    harness
        .handle
        .try_resume(Ticks(600_000))
        .await
        .expect_err("resume cannot land");
    assert_eq!(
        harness.handle.status(),
        PlaybackStatus::Error(PlaybackErrorKind::ResumeStuck)
    );

    harness.engine.emit_position(Ticks::from_secs(1));
    settle().await;
    assert_eq!(harness.handle.status(), PlaybackStatus::Playing);
}
