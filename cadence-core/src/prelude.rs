//! Curated surface for player crates.

pub use crate::clock::{Clock, TokioClock};
pub use crate::control::{PlaybackControlService, PlaybackHandle};
pub use crate::engine::{
    EngineEvent, EngineEventSink, EngineSource, EngineState, PlayerEngine,
};
pub use crate::error::{
    EngineError, PlaybackError, ProgressError, ResumeError, SourceError,
};
pub use crate::policy::{
    PlaybackPolicy, PlaybackTunables, PreferencesStore, StaticPreferences,
};
pub use crate::progress::{
    ProgressCheckpointer, ProgressReporter, ProgressSnapshot,
};
pub use crate::restart::{RestartReason, RestartReport, RestartRequest};
pub use crate::resume::ResumeSuccess;
pub use crate::source::{
    DeliveryProtocol, MediaSourceResolver, SourceQuery, SourceResolution,
};
pub use crate::status::{PlaybackErrorKind, PlaybackStatus, StatusStream};
pub use crate::types::{
    ItemId, PlayMethod, PlaybackRequest, PlaybackSession, SourceId,
    StreamProtocol, TICKS_PER_SECOND, Ticks,
};
