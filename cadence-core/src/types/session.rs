//! Playback session model shared by the coordinators and the control actor.

use serde::{Deserialize, Serialize};
use url::Url;

use super::ids::{ItemId, SourceId};
use super::ticks::Ticks;
use crate::engine::EngineState;

/// How the server delivers the media to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayMethod {
    /// The original file, unmodified.
    DirectPlay,
    /// Remuxed container, untouched codecs.
    DirectStream,
    Transcode,
}

/// Delivery protocol of the resolved stream.
///
/// The manifest offset only exists for segmented delivery, so a progressive
/// session can never carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamProtocol {
    Progressive,
    SegmentedStreaming {
        /// Time between the manifest's zero point and the logical start of
        /// the media.
        manifest_offset: Ticks,
        /// Nominal segment length when the server advertises one.
        segment_duration: Option<Ticks>,
    },
}

impl StreamProtocol {
    pub fn is_segmented(&self) -> bool {
        matches!(self, StreamProtocol::SegmentedStreaming { .. })
    }

    pub fn manifest_offset(&self) -> Option<Ticks> {
        match self {
            StreamProtocol::Progressive => None,
            StreamProtocol::SegmentedStreaming {
                manifest_offset, ..
            } => Some(*manifest_offset),
        }
    }

    pub fn segment_duration(&self) -> Option<Ticks> {
        match self {
            StreamProtocol::Progressive => None,
            StreamProtocol::SegmentedStreaming {
                segment_duration, ..
            } => *segment_duration,
        }
    }
}

/// Everything needed to resolve a source and start a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackRequest {
    pub item_id: ItemId,
    pub source_id: SourceId,
    pub audio_stream_index: Option<u32>,
    pub subtitle_stream_index: Option<u32>,
    /// Saved position to resume from; zero starts from the beginning.
    pub start_position: Ticks,
    pub max_streaming_bitrate: Option<u64>,
}

impl PlaybackRequest {
    pub fn new(item_id: ItemId, source_id: SourceId) -> Self {
        Self {
            item_id,
            source_id,
            audio_stream_index: None,
            subtitle_stream_index: None,
            start_position: Ticks::ZERO,
            max_streaming_bitrate: None,
        }
    }

    pub fn with_start_position(mut self, start_position: Ticks) -> Self {
        self.start_position = start_position;
        self
    }

    pub fn with_audio_stream(mut self, index: u32) -> Self {
        self.audio_stream_index = Some(index);
        self
    }

    pub fn with_subtitle_stream(mut self, index: Option<u32>) -> Self {
        self.subtitle_stream_index = index;
        self
    }

    pub fn with_max_streaming_bitrate(mut self, bitrate: Option<u64>) -> Self {
        self.max_streaming_bitrate = bitrate;
        self
    }
}

/// Outcome of feeding an observed position into the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionUpdate {
    Advanced,
    /// Position moved backwards right after a seek or restart.
    Rewound,
    /// Backwards jitter outside a seek window; the committed position is kept.
    Ignored,
}

/// A live playback session.
///
/// Owned by the control actor and only mutated from its event loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub item_id: ItemId,
    pub source_id: SourceId,
    pub audio_stream_index: Option<u32>,
    pub subtitle_stream_index: Option<u32>,
    pub max_streaming_bitrate: Option<u64>,
    pub start_position: Ticks,
    pub current_position: Ticks,
    pub play_method: PlayMethod,
    pub protocol: StreamProtocol,
    pub stream_url: Url,
    pub engine_state: EngineState,
    rewind_allowed: bool,
}

impl PlaybackSession {
    pub fn new(
        request: &PlaybackRequest,
        play_method: PlayMethod,
        protocol: StreamProtocol,
        stream_url: Url,
    ) -> Self {
        Self {
            item_id: request.item_id,
            source_id: request.source_id,
            audio_stream_index: request.audio_stream_index,
            subtitle_stream_index: request.subtitle_stream_index,
            max_streaming_bitrate: request.max_streaming_bitrate,
            start_position: request.start_position.clamp_non_negative(),
            current_position: Ticks::ZERO,
            play_method,
            protocol,
            stream_url,
            engine_state: EngineState::Idle,
            // A fresh session starts at zero and may land anywhere first.
            rewind_allowed: true,
        }
    }

    /// The request that would rebuild this session at `start_position`.
    pub fn to_request(&self, start_position: Ticks) -> PlaybackRequest {
        PlaybackRequest {
            item_id: self.item_id,
            source_id: self.source_id,
            audio_stream_index: self.audio_stream_index,
            subtitle_stream_index: self.subtitle_stream_index,
            start_position,
            max_streaming_bitrate: self.max_streaming_bitrate,
        }
    }

    pub fn manifest_offset(&self) -> Option<Ticks> {
        self.protocol.manifest_offset()
    }

    /// Raw engine position → position reported to the rest of the app.
    pub fn to_reported(&self, raw: Ticks) -> Ticks {
        match self.manifest_offset() {
            Some(offset) => raw + offset,
            None => raw,
        }
    }

    /// Desired absolute position → raw seek request for the engine.
    pub fn to_raw(&self, absolute: Ticks) -> Ticks {
        match self.manifest_offset() {
            Some(offset) => (absolute - offset).clamp_non_negative(),
            None => absolute.clamp_non_negative(),
        }
    }

    /// Opens a one-shot window in which the next observation may move the
    /// position backwards.
    pub fn mark_seek(&mut self) {
        self.rewind_allowed = true;
    }

    pub fn rewind_allowed(&self) -> bool {
        self.rewind_allowed
    }

    /// Feeds an already offset-corrected position.
    pub fn observe_position(&mut self, reported: Ticks) -> PositionUpdate {
        if reported >= self.current_position {
            self.current_position = reported;
            self.rewind_allowed = false;
            return PositionUpdate::Advanced;
        }

        if self.rewind_allowed {
            self.current_position = reported;
            self.rewind_allowed = false;
            PositionUpdate::Rewound
        } else {
            PositionUpdate::Ignored
        }
    }

    /// Sets the position confirmed by a completed resume or seek.
    pub fn commit_position(&mut self, position: Ticks) {
        self.current_position = position;
        self.rewind_allowed = false;
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.engine_state, EngineState::Paused)
    }
}
