//! Restarting a session after a track, subtitle or quality change.
//!
//! The restart service tears down the current stream and resolves the new
//! selection. The control actor then opens the planned session and resumes
//! it at the carried position.

use serde::{Deserialize, Serialize};

use crate::engine::PlayerEngine;
use crate::error::{PlaybackError, ResumeError};
use crate::resume::ResumeSuccess;
use crate::source::PlaybackSourceResolver;
use crate::types::{PlaybackRequest, PlaybackSession, Ticks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartReason {
    TrackChange { audio_stream_index: u32 },
    SubtitleChange { subtitle_stream_index: Option<u32> },
    QualityChange { max_streaming_bitrate: Option<u64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartRequest {
    pub reason: RestartReason,
    /// Position to carry into the new session instead of the current one.
    pub carry_position: Option<Ticks>,
}

impl RestartRequest {
    pub fn new(reason: RestartReason) -> Self {
        Self {
            reason,
            carry_position: None,
        }
    }

    pub fn carrying(mut self, position: Ticks) -> Self {
        self.carry_position = Some(position);
        self
    }

    /// The new playback request derived from `current`.
    pub fn to_playback_request(&self, current: &PlaybackSession) -> PlaybackRequest {
        let carry = self
            .carry_position
            .unwrap_or(current.current_position)
            .clamp_non_negative();
        let request = current.to_request(carry);
        match self.reason {
            RestartReason::TrackChange { audio_stream_index } => {
                request.with_audio_stream(audio_stream_index)
            }
            RestartReason::SubtitleChange {
                subtitle_stream_index,
            } => request.with_subtitle_stream(subtitle_stream_index),
            RestartReason::QualityChange {
                max_streaming_bitrate,
            } => request.with_max_streaming_bitrate(max_streaming_bitrate),
        }
    }
}

/// A resolved replacement session waiting to be opened and resumed.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartPlan {
    pub session: PlaybackSession,
    pub carry_position: Ticks,
}

/// Outcome of a restart. The new session stays in place even when the resume
/// did not land.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartReport {
    pub session: PlaybackSession,
    pub resume: Result<ResumeSuccess, ResumeError>,
}

#[derive(Debug, Clone)]
pub struct PlaybackRestartService {
    resolver: PlaybackSourceResolver,
}

impl PlaybackRestartService {
    pub fn new(resolver: PlaybackSourceResolver) -> Self {
        Self { resolver }
    }

    /// Stops the engine and resolves the replacement session.
    ///
    /// A failing stop is logged and ignored since the engine is about to be
    /// reopened. Resolution errors leave no session behind.
    pub async fn restart(
        &self,
        engine: &dyn PlayerEngine,
        current: &PlaybackSession,
        request: RestartRequest,
    ) -> Result<RestartPlan, PlaybackError> {
        let next = request.to_playback_request(current);
        let carry_position = next.start_position;

        tracing::info!(
            target: "playback::restart",
            item = %current.item_id,
            reason = ?request.reason,
            carry_ticks = carry_position.get(),
            "restarting playback"
        );

        if let Err(error) = engine.stop().await {
            tracing::warn!(
                target: "playback::restart",
                %error,
                "engine stop failed during restart; continuing"
            );
        }

        let session = self.resolver.resolve(&next).await.map_err(|error| {
            tracing::error!(
                target: "playback::restart",
                %error,
                "could not resolve restarted source"
            );
            PlaybackError::from(error)
        })?;

        Ok(RestartPlan {
            session,
            carry_position,
        })
    }
}
