pub mod ids;
pub mod session;
pub mod ticks;

pub use ids::{ItemId, SourceId};
pub use session::{
    PlayMethod, PlaybackRequest, PlaybackSession, PositionUpdate, StreamProtocol,
};
pub use ticks::{TICKS_PER_SECOND, Ticks};
