//! Hand-written fakes shared by the integration tests.
#![allow(dead_code, missing_debug_implementations)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

use cadence_core::error::{EngineError, ProgressError, SourceError};
use cadence_core::prelude::*;

type SeekScript = dyn Fn(Ticks) -> Option<Ticks> + Send + Sync;

#[derive(Debug, Default)]
struct EngineLog {
    sinks: Vec<EngineEventSink>,
    seeks: Vec<Ticks>,
    opened: Vec<EngineSource>,
    stops: usize,
    position: Option<Ticks>,
}

/// Engine fake that answers commands with scripted notifications.
///
/// `open` reports Opening, `play` reports Buffering and then the configured
/// settle state, `pause` reports Paused and `seek` reports whatever the seek
/// script returns as a completed seek.
///
/// Seeks complete inline unless a delay is set. With stale ticks enabled the
/// engine keeps reporting the playhead it had before the seek until the
/// seek completes.
pub struct ScriptedEngine {
    log: Arc<Mutex<EngineLog>>,
    seek_script: Box<SeekScript>,
    settle_state: EngineState,
    fail_seeks: bool,
    seek_delay: Option<Duration>,
    stale_ticks: bool,
}

impl ScriptedEngine {
    /// Lands every seek exactly where it was asked to.
    pub fn accurate() -> Self {
        Self::with_seek_script(Some)
    }

    pub fn with_seek_script(
        script: impl Fn(Ticks) -> Option<Ticks> + Send + Sync + 'static,
    ) -> Self {
        Self {
            log: Arc::new(Mutex::new(EngineLog::default())),
            seek_script: Box::new(script),
            settle_state: EngineState::Playing,
            fail_seeks: false,
            seek_delay: None,
            stale_ticks: false,
        }
    }

    /// Stays in `state` after `play` instead of reaching Playing.
    pub fn settling_in(mut self, state: EngineState) -> Self {
        self.settle_state = state;
        self
    }

    pub fn failing_seeks(mut self) -> Self {
        self.fail_seeks = true;
        self
    }

    /// Reports seek completion `delay` after the seek command.
    pub fn completing_after(mut self, delay: Duration) -> Self {
        self.seek_delay = Some(delay);
        self
    }

    /// Emits playhead ticks at the pre-seek position while a seek is in
    /// flight: one right away and, with a delay, one halfway through it.
    pub fn ticking_from_old_position(mut self) -> Self {
        self.stale_ticks = true;
        self
    }

    pub fn seeks(&self) -> Vec<Ticks> {
        self.log.lock().expect("engine log").seeks.clone()
    }

    pub fn stops(&self) -> usize {
        self.log.lock().expect("engine log").stops
    }

    pub fn opened(&self) -> Vec<EngineSource> {
        self.log.lock().expect("engine log").opened.clone()
    }

    /// Sink handed out by the `index`-th `open`.
    pub fn sink(&self, index: usize) -> EngineEventSink {
        self.log.lock().expect("engine log").sinks[index].clone()
    }

    fn current_sink(&self) -> Option<EngineEventSink> {
        self.log.lock().expect("engine log").sinks.last().cloned()
    }

    pub fn emit_state(&self, state: EngineState) {
        if let Some(sink) = self.current_sink() {
            sink.state_changed(state);
        }
    }

    pub fn emit_position(&self, raw: Ticks) {
        self.log.lock().expect("engine log").position = Some(raw);
        if let Some(sink) = self.current_sink() {
            sink.position_changed(raw);
        }
    }
}

#[async_trait]
impl PlayerEngine for ScriptedEngine {
    async fn open(
        &self,
        source: &EngineSource,
        events: EngineEventSink,
    ) -> Result<(), EngineError> {
        events.state_changed(EngineState::Opening);
        let mut log = self.log.lock().expect("engine log");
        log.opened.push(source.clone());
        log.sinks.push(events);
        log.position = None;
        Ok(())
    }

    async fn play(&self) -> Result<(), EngineError> {
        if let Some(sink) = self.current_sink() {
            sink.state_changed(EngineState::Buffering);
            if self.settle_state != EngineState::Buffering {
                sink.state_changed(self.settle_state);
            }
        }
        Ok(())
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.emit_state(EngineState::Paused);
        Ok(())
    }

    async fn seek(&self, raw_position: Ticks) -> Result<(), EngineError> {
        if self.fail_seeks {
            return Err(EngineError::Command("seek refused".into()));
        }
        let old = {
            let mut log = self.log.lock().expect("engine log");
            log.seeks.push(raw_position);
            log.position.unwrap_or(Ticks::ZERO)
        };
        let landed = (self.seek_script)(raw_position);
        let Some(sink) = self.current_sink() else {
            return Ok(());
        };
        if self.stale_ticks {
            sink.position_changed(old);
        }

        match self.seek_delay {
            None => {
                if let Some(landed) = landed {
                    self.log.lock().expect("engine log").position = Some(landed);
                    sink.seek_completed(landed);
                }
            }
            Some(delay) => {
                let log = self.log.clone();
                let stale_ticks = self.stale_ticks;
                tokio::spawn(async move {
                    tokio::time::sleep(delay / 2).await;
                    if stale_ticks {
                        sink.position_changed(old);
                    }
                    tokio::time::sleep(delay - delay / 2).await;
                    if let Some(landed) = landed {
                        log.lock().expect("engine log").position = Some(landed);
                        sink.seek_completed(landed);
                    }
                });
            }
        }
        Ok(())
    }

    fn position(&self) -> Option<Ticks> {
        self.log.lock().expect("engine log").position
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.log.lock().expect("engine log").stops += 1;
        Ok(())
    }
}

/// Resolver fake returning one fixed answer and recording queries.
pub struct StaticResolver {
    resolution: SourceResolution,
    queries: Mutex<Vec<SourceQuery>>,
}

impl StaticResolver {
    pub fn progressive() -> Self {
        Self::new(SourceResolution {
            play_method: PlayMethod::DirectPlay,
            protocol: DeliveryProtocol::Http,
            manifest_offset: None,
            segment_duration: None,
            stream_url: url("http://media.local/videos/1/stream"),
        })
    }

    pub fn segmented(manifest_offset: Ticks) -> Self {
        Self::new(SourceResolution {
            play_method: PlayMethod::Transcode,
            protocol: DeliveryProtocol::Segmented,
            manifest_offset: Some(manifest_offset),
            segment_duration: None,
            stream_url: url("http://media.local/videos/1/master.m3u8"),
        })
    }

    /// Segmented source whose server can only start at multiples of
    /// `segment`.
    pub fn segmented_in(manifest_offset: Ticks, segment: Ticks) -> Self {
        let mut resolver = Self::segmented(manifest_offset);
        resolver.resolution.segment_duration = Some(segment);
        resolver
    }

    pub fn new(resolution: SourceResolution) -> Self {
        Self {
            resolution,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<SourceQuery> {
        self.queries.lock().expect("queries").clone()
    }
}

#[async_trait]
impl MediaSourceResolver for StaticResolver {
    async fn resolve_playback_source(
        &self,
        query: &SourceQuery,
    ) -> Result<SourceResolution, SourceError> {
        self.queries.lock().expect("queries").push(query.clone());
        Ok(self.resolution.clone())
    }
}

/// Progress reporter fake recording every report.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(ItemId, Ticks, bool)>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<(ItemId, Ticks, bool)> {
        self.reports.lock().expect("reports").clone()
    }
}

#[async_trait]
impl ProgressReporter for RecordingReporter {
    async fn report_progress(
        &self,
        item_id: ItemId,
        position: Ticks,
        is_paused: bool,
    ) -> Result<(), ProgressError> {
        self.reports
            .lock()
            .expect("reports")
            .push((item_id, position, is_paused));
        Ok(())
    }
}

pub fn url(raw: &str) -> Url {
    Url::parse(raw).expect("valid url")
}

/// Tunables used by the scenarios: three attempts, three seconds each,
/// 50_000 ticks of tolerance.
pub fn tunables() -> PlaybackTunables {
    PlaybackTunables {
        resume_max_attempts: 3,
        resume_attempt_timeout_ms: 3_000,
        resume_total_timeout_ms: 12_000,
        position_tolerance_ticks: 50_000,
        keyframe_snap_window_ticks: Ticks::from_secs(10).get(),
        min_resume_position_ticks: 0,
        buffering_stall_timeout_ms: 8_000,
    }
}

pub struct Harness {
    pub engine: Arc<ScriptedEngine>,
    pub resolver: Arc<StaticResolver>,
    pub handle: PlaybackHandle,
    /// Actor task; finishes once every handle is gone.
    pub task: JoinHandle<()>,
}

pub fn spawn(engine: ScriptedEngine, resolver: StaticResolver) -> Harness {
    spawn_with(engine, resolver, tunables())
}

pub fn spawn_with(
    engine: ScriptedEngine,
    resolver: StaticResolver,
    tunables: PlaybackTunables,
) -> Harness {
    let engine = Arc::new(engine);
    let resolver = Arc::new(resolver);
    let (handle, task) = PlaybackControlService::new(
        engine.clone(),
        resolver.clone(),
        &StaticPreferences::new(tunables),
    )
    .spawn_with_task();
    Harness {
        engine,
        resolver,
        handle,
        task,
    }
}

pub fn request(start: Ticks) -> PlaybackRequest {
    PlaybackRequest::new(ItemId::new(), SourceId::new()).with_start_position(start)
}

/// Lets the actor drain its queues without moving the clock.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Moves a paused clock forward and lets timers fire.
pub async fn advance(by: Duration) {
    tokio::time::advance(by).await;
    settle().await;
}
