// Error types for playback sessions

use thiserror::Error;

use super::engine::MediaError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    /// Engine could not open the local file
    #[error("Failed to load media: {0}")]
    MediaLoad(#[from] MediaError),

    /// Transport or seek requested before a file was loaded
    #[error("Playback session is not ready")]
    SessionNotReady,
}
