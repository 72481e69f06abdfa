// Player module - playback sessions, media engine contract, control overlay

pub mod engine;
pub mod errors;
pub mod overlay;
pub mod session;

pub use engine::{HeadlessEngine, MediaEngine, MediaError, MediaInfo};
pub use errors::PlayerError;
pub use overlay::{ControlOverlay, OverlayVisibility, HIDE_DELAY};
pub use session::{PlaybackSession, PlaybackStatus, SessionId, SessionSnapshot, SKIP_STEP_MS};
