use cadence_core::policy::{PlaybackPolicy, PolicyWarning};
use std::fmt;
use thiserror::Error;

use crate::models::PlaybackConfig;

/// Attempts beyond this turn a stuck resume into a seek storm.
pub const MAX_RESUME_ATTEMPTS: u32 = 10;
/// Longest a resume may keep the player busy.
pub const MAX_RESUME_TOTAL_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("resume.max_attempts {value} exceeds the limit of {limit}")]
    ExcessiveAttempts { value: u32, limit: u32 },
    #[error("resume.total_timeout_ms {value} exceeds the limit of {limit}")]
    ExcessiveResumeTimeout { value: u64, limit: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
    pub hint: Option<String>,
}

impl From<PolicyWarning> for ConfigWarning {
    fn from(warning: PolicyWarning) -> Self {
        Self {
            field: warning.field,
            message: warning.message,
            hint: None,
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push_with_hint<H: Into<String>>(
        &mut self,
        field: &'static str,
        message: impl Into<String>,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            field,
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Checks a config before it is handed to the core.
///
/// Values the core would clamp come back as warnings; values far outside any
/// sensible range are refused.
pub fn apply_guard_rails(
    config: &PlaybackConfig,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    if config.resume.max_attempts > MAX_RESUME_ATTEMPTS {
        return Err(ConfigGuardRailError::ExcessiveAttempts {
            value: config.resume.max_attempts,
            limit: MAX_RESUME_ATTEMPTS,
        });
    }
    if config.resume.total_timeout_ms > MAX_RESUME_TOTAL_TIMEOUT_MS {
        return Err(ConfigGuardRailError::ExcessiveResumeTimeout {
            value: config.resume.total_timeout_ms,
            limit: MAX_RESUME_TOTAL_TIMEOUT_MS,
        });
    }

    let (_, corrections) = PlaybackPolicy::from_tunables(&config.to_tunables());
    let mut warnings = ConfigWarnings {
        items: corrections.into_iter().map(ConfigWarning::from).collect(),
    };

    let attempts_budget = config
        .resume
        .attempt_timeout_ms
        .saturating_mul(u64::from(config.resume.max_attempts));
    if config.resume.total_timeout_ms < attempts_budget {
        warnings.push_with_hint(
            "resume.total_timeout_ms",
            format!(
                "{} ms cannot fit {} attempts of {} ms",
                config.resume.total_timeout_ms,
                config.resume.max_attempts,
                config.resume.attempt_timeout_ms
            ),
            "later attempts are cut short; raise total_timeout_ms or lower max_attempts",
        );
    }

    if config.buffering.stall_timeout_ms > 0
        && config.buffering.stall_timeout_ms < 1_000
    {
        warnings.push_with_hint(
            "buffering.stall_timeout_ms",
            format!("{} ms is shorter than a typical segment fetch", config.buffering.stall_timeout_ms),
            "values below one second report stalls on healthy streams",
        );
    }

    Ok(warnings)
}
