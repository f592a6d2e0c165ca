//! Resume and buffering tunables.
//!
//! [`PlaybackTunables`] is the flat, serializable shape read from the
//! preferences store. [`PlaybackPolicy`] is the validated form shared by the
//! resume flow, the restart service and the buffering coordinator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::types::Ticks;

/// Read-only access to persisted playback preferences.
pub trait PreferencesStore: Send + Sync {
    fn playback_tunables(&self) -> PlaybackTunables;
}

/// Raw resume/buffering tunables as stored in preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackTunables {
    /// Seeks issued per resume cycle before giving up.
    pub resume_max_attempts: u32,
    /// How long one attempt waits for the engine to report a position.
    pub resume_attempt_timeout_ms: u64,
    /// Hard ceiling for a whole resume cycle, readiness wait included.
    pub resume_total_timeout_ms: u64,
    /// Distance from the target that still counts as landed.
    pub position_tolerance_ticks: i64,
    /// Largest snap a segmented stream may apply to a seek and still be
    /// accepted as keyframe alignment.
    pub keyframe_snap_window_ticks: i64,
    /// Saved positions below this start from the beginning instead.
    pub min_resume_position_ticks: i64,
    /// Time spent buffering before the advisory stall signal fires.
    pub buffering_stall_timeout_ms: u64,
}

impl Default for PlaybackTunables {
    fn default() -> Self {
        Self {
            resume_max_attempts: 3,
            resume_attempt_timeout_ms: 3_000,
            resume_total_timeout_ms: 12_000,
            position_tolerance_ticks: Ticks::from_secs(2).get(),
            keyframe_snap_window_ticks: Ticks::from_secs(10).get(),
            min_resume_position_ticks: 0,
            buffering_stall_timeout_ms: 8_000,
        }
    }
}

/// Preferences store backed by a fixed set of tunables.
#[derive(Debug, Clone, Default)]
pub struct StaticPreferences {
    tunables: PlaybackTunables,
}

impl StaticPreferences {
    pub fn new(tunables: PlaybackTunables) -> Self {
        Self { tunables }
    }
}

impl PreferencesStore for StaticPreferences {
    fn playback_tunables(&self) -> PlaybackTunables {
        self.tunables.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePolicy {
    pub max_attempts: u32,
    pub per_attempt_timeout: Duration,
    pub total_timeout: Duration,
    pub position_tolerance: Ticks,
    pub keyframe_snap_window: Ticks,
    pub min_resume_position: Ticks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferingPolicy {
    pub stall_timeout: Duration,
}

/// Validated policy shared by every coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackPolicy {
    pub resume: ResumePolicy,
    pub buffering: BufferingPolicy,
}

impl Default for PlaybackPolicy {
    fn default() -> Self {
        Self::from_tunables(&PlaybackTunables::default()).0
    }
}

/// A tunable that was out of range and has been replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyWarning {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for PolicyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl PlaybackPolicy {
    /// Reads tunables from `store`, logging any correction that was needed.
    pub fn from_preferences(store: &dyn PreferencesStore) -> Arc<Self> {
        let (policy, warnings) = Self::from_tunables(&store.playback_tunables());
        for warning in &warnings {
            tracing::warn!(
                target: "playback::policy",
                field = warning.field,
                "{}",
                warning.message
            );
        }
        Arc::new(policy)
    }

    /// Clamps out-of-range tunables to usable values.
    pub fn from_tunables(
        tunables: &PlaybackTunables,
    ) -> (Self, Vec<PolicyWarning>) {
        let defaults = PlaybackTunables::default();
        let mut warnings = Vec::new();

        let max_attempts = if tunables.resume_max_attempts == 0 {
            warnings.push(PolicyWarning {
                field: "resume_max_attempts",
                message: "must be at least 1; using 1".into(),
            });
            1
        } else {
            tunables.resume_max_attempts
        };

        let attempt_ms = if tunables.resume_attempt_timeout_ms == 0 {
            warnings.push(PolicyWarning {
                field: "resume_attempt_timeout_ms",
                message: format!(
                    "must be positive; using {}",
                    defaults.resume_attempt_timeout_ms
                ),
            });
            defaults.resume_attempt_timeout_ms
        } else {
            tunables.resume_attempt_timeout_ms
        };

        let total_ms = if tunables.resume_total_timeout_ms < attempt_ms {
            warnings.push(PolicyWarning {
                field: "resume_total_timeout_ms",
                message: format!(
                    "shorter than one attempt; raising to {attempt_ms}"
                ),
            });
            attempt_ms
        } else {
            tunables.resume_total_timeout_ms
        };

        let tolerance = if tunables.position_tolerance_ticks <= 0 {
            warnings.push(PolicyWarning {
                field: "position_tolerance_ticks",
                message: format!(
                    "must be positive; using {}",
                    defaults.position_tolerance_ticks
                ),
            });
            defaults.position_tolerance_ticks
        } else {
            tunables.position_tolerance_ticks
        };

        let snap_window = if tunables.keyframe_snap_window_ticks < tolerance {
            warnings.push(PolicyWarning {
                field: "keyframe_snap_window_ticks",
                message: format!(
                    "smaller than the position tolerance; raising to {tolerance}"
                ),
            });
            tolerance
        } else {
            tunables.keyframe_snap_window_ticks
        };

        let min_resume = if tunables.min_resume_position_ticks < 0 {
            warnings.push(PolicyWarning {
                field: "min_resume_position_ticks",
                message: "must not be negative; using 0".into(),
            });
            0
        } else {
            tunables.min_resume_position_ticks
        };

        let stall_ms = if tunables.buffering_stall_timeout_ms == 0 {
            warnings.push(PolicyWarning {
                field: "buffering_stall_timeout_ms",
                message: format!(
                    "must be positive; using {}",
                    defaults.buffering_stall_timeout_ms
                ),
            });
            defaults.buffering_stall_timeout_ms
        } else {
            tunables.buffering_stall_timeout_ms
        };

        let policy = PlaybackPolicy {
            resume: ResumePolicy {
                max_attempts,
                per_attempt_timeout: Duration::from_millis(attempt_ms),
                total_timeout: Duration::from_millis(total_ms),
                position_tolerance: Ticks(tolerance),
                keyframe_snap_window: Ticks(snap_window),
                min_resume_position: Ticks(min_resume),
            },
            buffering: BufferingPolicy {
                stall_timeout: Duration::from_millis(stall_ms),
            },
        };

        (policy, warnings)
    }
}
