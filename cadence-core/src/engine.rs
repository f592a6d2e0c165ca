//! Player engine port.
//!
//! The engine delivers notifications from threads this crate does not own.
//! Every notification goes through an [`EngineEventSink`], which only posts
//! into the control actor's queue and never touches session state directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use url::Url;

use crate::error::EngineError;
use crate::types::{PlayMethod, Ticks};

/// Engine lifecycle states as reported by the engine itself.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum EngineState {
    #[default]
    Idle,
    Opening,
    Buffering,
    Playing,
    Paused,
    Ended,
    Error,
}

impl EngineState {
    /// States in which the engine is still loading data.
    pub fn is_transitional(&self) -> bool {
        matches!(self, EngineState::Opening | EngineState::Buffering)
    }
}

/// What the engine should open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSource {
    pub url: Url,
    pub play_method: PlayMethod,
    pub segmented: bool,
}

/// Raw notification emitted by the engine. Positions are raw engine
/// positions, before any manifest offset correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    StateChanged(EngineState),
    PositionChanged(Ticks),
    SeekCompleted(Ticks),
}

/// Engine event tagged with the session generation it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedEngineEvent {
    pub generation: u64,
    pub event: EngineEvent,
}

/// Thread-safe callback target handed to the engine on `open`.
///
/// Events posted after the session was replaced carry a stale generation and
/// are dropped by the control actor.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEngineEvent>,
}

impl EngineEventSink {
    pub(crate) fn new(
        generation: u64,
        tx: mpsc::UnboundedSender<TaggedEngineEvent>,
    ) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the control actor is gone.
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.tx
            .send(TaggedEngineEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn state_changed(&self, state: EngineState) -> bool {
        self.emit(EngineEvent::StateChanged(state))
    }

    pub fn position_changed(&self, raw: Ticks) -> bool {
        self.emit(EngineEvent::PositionChanged(raw))
    }

    pub fn seek_completed(&self, raw: Ticks) -> bool {
        self.emit(EngineEvent::SeekCompleted(raw))
    }
}

/// The media engine actually decoding and rendering the stream.
///
/// Positions in and out of the engine are raw: the control service applies
/// the session's manifest offset on both directions.
#[async_trait]
pub trait PlayerEngine: Send + Sync {
    /// Loads `source` and starts delivering events to `events`. Opening a new
    /// source replaces any previous one.
    async fn open(
        &self,
        source: &EngineSource,
        events: EngineEventSink,
    ) -> Result<(), EngineError>;

    async fn play(&self) -> Result<(), EngineError>;

    async fn pause(&self) -> Result<(), EngineError>;

    async fn seek(&self, raw_position: Ticks) -> Result<(), EngineError>;

    /// Last raw position known to the engine.
    fn position(&self) -> Option<Ticks>;

    async fn stop(&self) -> Result<(), EngineError>;
}
