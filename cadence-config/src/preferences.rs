use cadence_core::policy::{PlaybackTunables, PreferencesStore};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::models::{PlaybackConfig, PlaybackConfigSource};
use crate::validation::{ConfigWarnings, apply_guard_rails};

/// Preferences store backed by the playback config file.
///
/// Keeps the last successfully loaded tunables; a failed [`reload`] leaves
/// them untouched.
///
/// [`reload`]: FilePreferencesStore::reload
#[derive(Debug)]
pub struct FilePreferencesStore {
    origin: Origin,
    state: RwLock<Loaded>,
}

#[derive(Debug, Clone)]
enum Origin {
    Env,
    File(PathBuf),
}

#[derive(Debug, Clone)]
struct Loaded {
    tunables: PlaybackTunables,
    source: PlaybackConfigSource,
}

impl FilePreferencesStore {
    /// Loads through [`PlaybackConfig::load_from_env`].
    pub fn from_env() -> anyhow::Result<(Self, ConfigWarnings)> {
        Self::load(Origin::Env)
    }

    /// Loads from an explicit file, ignoring the environment.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<(Self, ConfigWarnings)> {
        Self::load(Origin::File(path.as_ref().to_path_buf()))
    }

    pub fn source(&self) -> PlaybackConfigSource {
        self.read().source.clone()
    }

    /// Re-reads the underlying config.
    pub fn reload(&self) -> anyhow::Result<ConfigWarnings> {
        let (loaded, warnings) = read_origin(&self.origin)?;
        tracing::info!(
            target: "playback::config",
            source = ?loaded.source,
            warnings = warnings.len(),
            "playback config reloaded"
        );
        match self.state.write() {
            Ok(mut state) => *state = loaded,
            Err(poisoned) => *poisoned.into_inner() = loaded,
        }
        Ok(warnings)
    }

    fn load(origin: Origin) -> anyhow::Result<(Self, ConfigWarnings)> {
        let (loaded, warnings) = read_origin(&origin)?;
        tracing::info!(
            target: "playback::config",
            source = ?loaded.source,
            warnings = warnings.len(),
            "playback config loaded"
        );
        Ok((
            Self {
                origin,
                state: RwLock::new(loaded),
            },
            warnings,
        ))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Loaded> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn read_origin(origin: &Origin) -> anyhow::Result<(Loaded, ConfigWarnings)> {
    let (config, source) = match origin {
        Origin::Env => PlaybackConfig::load_from_env()?,
        Origin::File(path) => (
            PlaybackConfig::load_from_file(path)?,
            PlaybackConfigSource::File(path.clone()),
        ),
    };

    let warnings = apply_guard_rails(&config)?;
    for warning in warnings.iter() {
        tracing::warn!(target: "playback::config", "{warning}");
    }

    Ok((
        Loaded {
            tunables: config.to_tunables(),
            source,
        },
        warnings,
    ))
}

impl PreferencesStore for FilePreferencesStore {
    fn playback_tunables(&self) -> PlaybackTunables {
        self.read().tunables.clone()
    }
}
