use thiserror::Error;

use crate::types::Ticks;

/// Failures reported by a [`PlayerEngine`](crate::engine::PlayerEngine).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine failed to open source: {0}")]
    Open(String),

    #[error("Engine command failed: {0}")]
    Command(String),

    #[error("Engine is not open")]
    NotOpen,
}

/// Failures while resolving a playback source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Media source lookup failed: {0}")]
    Lookup(String),

    #[error("Invalid media source: {0}")]
    Invalid(String),
}

/// Failure reported by a [`ProgressReporter`](crate::progress::ProgressReporter).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgressError {
    #[error("Progress report rejected: {0}")]
    Rejected(String),

    #[error("Progress reporter unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a resume cycle that did not land on its target.
///
/// `Timeout` and `Stuck` are the two user-facing kinds; both are non-fatal
/// and playback continues wherever the engine ended up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResumeError {
    #[error(
        "Resume to {target} timed out after {attempts} attempt(s) (last position: {last_observed:?})"
    )]
    Timeout {
        target: Ticks,
        attempts: u32,
        last_observed: Option<Ticks>,
    },

    #[error(
        "Resume to {target} stuck after {attempts} attempt(s) (last position: {last_observed:?})"
    )]
    Stuck {
        target: Ticks,
        attempts: u32,
        last_observed: Option<Ticks>,
    },

    #[error("A resume is already in flight for this session")]
    AlreadyInFlight,

    #[error("Resume superseded by an explicit seek")]
    Superseded,

    #[error("Resume cancelled")]
    Cancelled,

    #[error("No active playback session")]
    NoSession,
}

/// Errors returned by the playback control surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Resume error: {0}")]
    Resume(#[from] ResumeError),

    #[error("No active playback session")]
    NoSession,

    #[error("Playback control service has shut down")]
    ServiceStopped,
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
