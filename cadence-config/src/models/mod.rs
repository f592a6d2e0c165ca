pub mod playback;

pub use playback::{
    BufferingConfig, CONFIG_JSON_ENV, CONFIG_PATH_ENV, PlaybackConfig,
    PlaybackConfigSource, ResumeConfig,
};
