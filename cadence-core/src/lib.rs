//! # Cadence Core
//!
//! Resume, restart and buffering orchestration for streaming playback
//! clients.
//!
//! ## Overview
//!
//! Whenever a session starts, resumes from a saved position or restarts after
//! a track, subtitle or quality change, this crate decides how to reposition
//! the player engine and reports one consistent playback status:
//!
//! - **Resume**: bounded seek/verify/retry cycles that tolerate keyframe
//!   snapping on segmented streams
//! - **Restart**: carry the position into a freshly resolved session
//! - **Buffering**: episodes with an advisory stall signal
//! - **Status**: deduplicated status stream for UI consumers
//!
//! ## Architecture
//!
//! - [`control`]: the actor owning session state and its [`PlaybackHandle`]
//! - [`resume`]: the per-cycle retry loop and the session-level flow
//! - [`seek`] and [`buffering`]: sans-IO coordinators fed by the actor
//! - [`source`] and [`restart`]: source resolution and restart planning
//! - [`status`]: the user-facing status orchestrator
//! - [`engine`], [`source::MediaSourceResolver`],
//!   [`progress::ProgressReporter`], [`policy::PreferencesStore`]: ports to
//!   the host application
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use cadence_core::prelude::*;
//!
//! async fn resume_item(
//!     engine: Arc<dyn PlayerEngine>,
//!     resolver: Arc<dyn MediaSourceResolver>,
//! ) -> Result<(), PlaybackError> {
//!     let handle = PlaybackControlService::new(
//!         engine,
//!         resolver,
//!         &StaticPreferences::default(),
//!     )
//!     .spawn();
//!
//!     let request = PlaybackRequest::new(ItemId::new(), SourceId::new())
//!         .with_start_position(Ticks::from_secs(600));
//!     handle.start(request).await?;
//!     handle.stop().await
//! }
//! ```

#![allow(missing_docs)]

/// Buffering episodes and the stall signal
pub mod buffering;

/// Time source and cancellable timers
pub mod clock;

/// Playback control actor and handle
pub mod control;

/// Player engine port
pub mod engine;

/// Error types
pub mod error;

/// Tunables and the validated playback policy
pub mod policy;

/// Curated re-exports for client crates
pub mod prelude;

/// Progress snapshots and periodic checkpoints
pub mod progress;

/// Restart after track, subtitle or quality changes
pub mod restart;

/// Resume cycles
pub mod resume;

/// Seek verification
pub mod seek;

/// Playback source resolution
pub mod source;

/// User-facing playback status
pub mod status;

/// Shared playback types
pub mod types;

pub use control::{PlaybackControlService, PlaybackHandle};
pub use error::{PlaybackError, Result};
