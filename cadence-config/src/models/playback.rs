use anyhow::{Context, anyhow};
use cadence_core::policy::PlaybackTunables;
use cadence_core::types::{TICKS_PER_SECOND, Ticks};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Environment variable naming a TOML or JSON playback config file.
pub const CONFIG_PATH_ENV: &str = "CADENCE_PLAYBACK_CONFIG_PATH";
/// Environment variable holding an inline JSON playback config.
pub const CONFIG_JSON_ENV: &str = "CADENCE_PLAYBACK_CONFIG_JSON";

const TICKS_PER_MILLI: i64 = TICKS_PER_SECOND / 1_000;

/// Source that produced the playback configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Resume behaviour after start, explicit resume and restarts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResumeConfig {
    /// Seeks issued per resume before giving up. Raise on servers that need
    /// a second nudge after transcoder start-up.
    pub max_attempts: u32,
    /// Time (ms) one attempt waits for the engine to report a position.
    pub attempt_timeout_ms: u64,
    /// Ceiling (ms) for a whole resume, including waiting for the engine to
    /// become ready.
    pub total_timeout_ms: u64,
    /// Distance (ms) from the target that still counts as landed.
    pub position_tolerance_ms: u64,
    /// Largest keyframe/segment snap (ms) accepted on segmented streams.
    pub keyframe_snap_window_ms: u64,
    /// Saved positions (ms) below this start from the beginning.
    pub min_resume_position_ms: u64,
}

/// Buffering stall detection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferingConfig {
    /// Time (ms) spent buffering before the advisory stall status.
    pub stall_timeout_ms: u64,
}

/// Playback tunables as written in `playback.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub resume: ResumeConfig,
    pub buffering: BufferingConfig,
}

impl Default for ResumeConfig {
    fn default() -> Self {
        PlaybackConfig::from_tunables(&PlaybackTunables::default()).resume
    }
}

impl Default for BufferingConfig {
    fn default() -> Self {
        PlaybackConfig::from_tunables(&PlaybackTunables::default()).buffering
    }
}

/// Rounds to the nearest millisecond. Positive sub-millisecond values keep
/// one millisecond so a tolerance never collapses to zero.
fn ticks_to_ms(ticks: i64) -> u64 {
    if ticks <= 0 {
        return 0;
    }
    let rounded = ticks.saturating_add(TICKS_PER_MILLI / 2) / TICKS_PER_MILLI;
    u64::try_from(rounded.max(1)).unwrap_or(0)
}

fn ms_to_ticks(ms: u64) -> i64 {
    Ticks::from_millis(i64::try_from(ms).unwrap_or(i64::MAX)).get()
}

impl PlaybackConfig {
    pub fn from_tunables(tunables: &PlaybackTunables) -> Self {
        Self {
            resume: ResumeConfig {
                max_attempts: tunables.resume_max_attempts,
                attempt_timeout_ms: tunables.resume_attempt_timeout_ms,
                total_timeout_ms: tunables.resume_total_timeout_ms,
                position_tolerance_ms: ticks_to_ms(
                    tunables.position_tolerance_ticks,
                ),
                keyframe_snap_window_ms: ticks_to_ms(
                    tunables.keyframe_snap_window_ticks,
                ),
                min_resume_position_ms: ticks_to_ms(
                    tunables.min_resume_position_ticks,
                ),
            },
            buffering: BufferingConfig {
                stall_timeout_ms: tunables.buffering_stall_timeout_ms,
            },
        }
    }

    pub fn to_tunables(&self) -> PlaybackTunables {
        PlaybackTunables {
            resume_max_attempts: self.resume.max_attempts,
            resume_attempt_timeout_ms: self.resume.attempt_timeout_ms,
            resume_total_timeout_ms: self.resume.total_timeout_ms,
            position_tolerance_ticks: ms_to_ticks(
                self.resume.position_tolerance_ms,
            ),
            keyframe_snap_window_ticks: ms_to_ticks(
                self.resume.keyframe_snap_window_ms,
            ),
            min_resume_position_ticks: ms_to_ticks(
                self.resume.min_resume_position_ms,
            ),
            buffering_stall_timeout_ms: self.buffering.stall_timeout_ms,
        }
    }

    /// Load playback configuration using environment variables.
    /// Evaluation order:
    /// 1) `$CADENCE_PLAYBACK_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$CADENCE_PLAYBACK_CONFIG_JSON` (inline JSON),
    /// 3) the first default file that exists,
    /// 4) defaults.
    pub fn load_from_env() -> anyhow::Result<(Self, PlaybackConfigSource)> {
        if let Ok(path_str) = env::var(CONFIG_PATH_ENV)
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            return Ok((config, PlaybackConfigSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var(CONFIG_JSON_ENV)
            && !raw.trim().is_empty()
        {
            let parsed = Self::parse_json(&raw)
                .with_context(|| format!("failed to parse {CONFIG_JSON_ENV}"))?;
            return Ok((parsed, PlaybackConfigSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file() {
            let config = Self::load_from_file(&path)?;
            return Ok((config, PlaybackConfigSource::File(path)));
        }

        Ok((Self::default(), PlaybackConfigSource::Default))
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| {
            format!("failed to read playback config from {}", path.display())
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents).with_context(|| {
                format!("invalid playback config {}", path.display())
            }),
            Some("toml") => toml::from_str(&contents).map_err(|err| {
                anyhow!("invalid playback config {}: {}", path.display(), err)
            }),
            _ => Self::parse_from_str(&contents, &path.display().to_string()),
        }
    }

    /// Parses TOML, falling back to JSON.
    pub fn parse_from_str(
        contents: &str,
        origin: &str,
    ) -> anyhow::Result<Self> {
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                anyhow!(
                    "failed to parse playback config {}: toml error: {}; json error: {}",
                    origin,
                    toml_err,
                    json_err
                )
            })
        })
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| anyhow!("invalid playback config json: {err}"))
    }

    /// Renders the config as TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string(self)
            .map_err(|err| anyhow!("failed to render playback config: {err}"))
    }

    fn find_default_file() -> Option<PathBuf> {
        const CANDIDATES: &[&str] = &[
            "playback.toml",
            "playback.json",
            "config/playback.toml",
            "config/playback.json",
        ];

        CANDIDATES
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }
}
