//! Playback configuration for cadence.
//!
//! Loads the playback tunables from files or the environment, checks them
//! against guard rails and serves them to the core through the
//! [`PreferencesStore`](cadence_core::policy::PreferencesStore) port. Also
//! carries the tracing bootstrap shared by cadence binaries.

pub mod models;
pub mod preferences;
pub mod telemetry;
pub mod validation;

pub use models::{
    BufferingConfig, PlaybackConfig, PlaybackConfigSource, ResumeConfig,
};
pub use preferences::FilePreferencesStore;
pub use telemetry::init_tracing;
pub use validation::{
    ConfigGuardRailError, ConfigWarning, ConfigWarnings, apply_guard_rails,
};
