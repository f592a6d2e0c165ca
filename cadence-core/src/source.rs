//! Playback source resolution.
//!
//! The media-source collaborator decides what the server can deliver. This
//! module turns its answer into a [`PlaybackSession`] and enforces the
//! protocol invariants the rest of the core relies on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use crate::error::SourceError;
use crate::types::{
    ItemId, PlayMethod, PlaybackRequest, PlaybackSession, SourceId,
    StreamProtocol, Ticks,
};

/// Query sent to the media-source collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceQuery {
    pub item_id: ItemId,
    pub source_id: SourceId,
    pub audio_stream_index: Option<u32>,
    pub subtitle_stream_index: Option<u32>,
    pub max_streaming_bitrate: Option<u64>,
}

impl From<&PlaybackRequest> for SourceQuery {
    fn from(request: &PlaybackRequest) -> Self {
        Self {
            item_id: request.item_id,
            source_id: request.source_id,
            audio_stream_index: request.audio_stream_index,
            subtitle_stream_index: request.subtitle_stream_index,
            max_streaming_bitrate: request.max_streaming_bitrate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryProtocol {
    /// Plain HTTP byte ranges.
    Http,
    /// Manifest plus media segments.
    Segmented,
}

/// Collaborator answer for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceResolution {
    pub play_method: PlayMethod,
    pub protocol: DeliveryProtocol,
    pub manifest_offset: Option<Ticks>,
    pub segment_duration: Option<Ticks>,
    pub stream_url: Url,
}

/// Media-source collaborator (typically the media server's playback-info
/// endpoint).
#[async_trait]
pub trait MediaSourceResolver: Send + Sync {
    async fn resolve_playback_source(
        &self,
        query: &SourceQuery,
    ) -> Result<SourceResolution, SourceError>;
}

#[derive(Clone)]
pub struct PlaybackSourceResolver {
    resolver: Arc<dyn MediaSourceResolver>,
}

impl std::fmt::Debug for PlaybackSourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSourceResolver")
            .field("resolver", &"MediaSourceResolver(..)")
            .finish()
    }
}

impl PlaybackSourceResolver {
    pub fn new(resolver: Arc<dyn MediaSourceResolver>) -> Self {
        Self { resolver }
    }

    pub async fn resolve(
        &self,
        request: &PlaybackRequest,
    ) -> Result<PlaybackSession, SourceError> {
        let query = SourceQuery::from(request);
        let resolution = self.resolver.resolve_playback_source(&query).await?;
        let protocol = normalize_protocol(&resolution)?;

        tracing::info!(
            target: "playback::source",
            item = %request.item_id,
            source = %request.source_id,
            play_method = ?resolution.play_method,
            ?protocol,
            "playback source resolved"
        );

        Ok(PlaybackSession::new(
            request,
            resolution.play_method,
            protocol,
            resolution.stream_url,
        ))
    }
}

fn normalize_protocol(
    resolution: &SourceResolution,
) -> Result<StreamProtocol, SourceError> {
    match resolution.protocol {
        DeliveryProtocol::Http => {
            if let Some(offset) = resolution.manifest_offset
                && !offset.is_zero()
            {
                tracing::warn!(
                    target: "playback::source",
                    offset = offset.get(),
                    "ignoring manifest offset on a progressive source"
                );
            }
            Ok(StreamProtocol::Progressive)
        }
        DeliveryProtocol::Segmented => {
            if resolution.play_method == PlayMethod::DirectPlay {
                return Err(SourceError::Invalid(
                    "direct play cannot use segmented delivery".into(),
                ));
            }

            let manifest_offset = resolution.manifest_offset.unwrap_or_default();
            if manifest_offset < Ticks::ZERO {
                return Err(SourceError::Invalid(format!(
                    "negative manifest offset {}",
                    manifest_offset.get()
                )));
            }

            Ok(StreamProtocol::SegmentedStreaming {
                manifest_offset,
                segment_duration: resolution
                    .segment_duration
                    .filter(|segment| segment.is_positive()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver(Result<SourceResolution, SourceError>);

    #[async_trait]
    impl MediaSourceResolver for FixedResolver {
        async fn resolve_playback_source(
            &self,
            _query: &SourceQuery,
        ) -> Result<SourceResolution, SourceError> {
            self.0.clone()
        }
    }

    fn resolution(
        play_method: PlayMethod,
        protocol: DeliveryProtocol,
        manifest_offset: Option<i64>,
    ) -> SourceResolution {
        SourceResolution {
            play_method,
            protocol,
            manifest_offset: manifest_offset.map(Ticks),
            segment_duration: Some(Ticks::from_secs(6)),
            stream_url: Url::parse("http://localhost/stream").expect("url"),
        }
    }

    async fn resolve(
        answer: Result<SourceResolution, SourceError>,
    ) -> Result<PlaybackSession, SourceError> {
        let resolver = PlaybackSourceResolver::new(Arc::new(FixedResolver(answer)));
        let request = PlaybackRequest::new(ItemId::new(), SourceId::new())
            .with_start_position(Ticks(1_000));
        resolver.resolve(&request).await
    }

    #[tokio::test]
    async fn segmented_source_keeps_offset() {
        let session = resolve(Ok(resolution(
            PlayMethod::Transcode,
            DeliveryProtocol::Segmented,
            Some(20_000),
        )))
        .await
        .expect("resolves");

        assert_eq!(session.manifest_offset(), Some(Ticks(20_000)));
        assert_eq!(session.protocol.segment_duration(), Some(Ticks::from_secs(6)));
        assert_eq!(session.start_position, Ticks(1_000));
        assert_eq!(session.current_position, Ticks::ZERO);
    }

    #[tokio::test]
    async fn progressive_source_drops_offset() {
        let session = resolve(Ok(resolution(
            PlayMethod::DirectPlay,
            DeliveryProtocol::Http,
            Some(20_000),
        )))
        .await
        .expect("resolves");
        assert_eq!(session.protocol, StreamProtocol::Progressive);
        assert_eq!(session.manifest_offset(), None);
    }

    #[tokio::test]
    async fn segmented_without_offset_defaults_to_zero() {
        let session = resolve(Ok(resolution(
            PlayMethod::DirectStream,
            DeliveryProtocol::Segmented,
            None,
        )))
        .await
        .expect("resolves");
        assert_eq!(session.manifest_offset(), Some(Ticks::ZERO));
    }

    #[tokio::test]
    async fn inconsistent_answers_are_rejected() {
        assert!(matches!(
            resolve(Ok(resolution(
                PlayMethod::DirectPlay,
                DeliveryProtocol::Segmented,
                None,
            )))
            .await,
            Err(SourceError::Invalid(_))
        ));
        assert!(matches!(
            resolve(Ok(resolution(
                PlayMethod::Transcode,
                DeliveryProtocol::Segmented,
                Some(-5),
            )))
            .await,
            Err(SourceError::Invalid(_))
        ));
        assert_eq!(
            resolve(Err(SourceError::Lookup("offline".into()))).await,
            Err(SourceError::Lookup("offline".into()))
        );
    }
}
