// Error types surfaced by the video browser

use thiserror::Error;
use time::PrimitiveDateTime;

use crate::client::ClientError;
use crate::player::{MediaError, PlayerError, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrowserError {
    /// Start of the search window is not before its end
    #[error("Invalid time range: start {start} is not before end {end}")]
    InvalidTimeRange {
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    },

    /// Other unusable filter input (zero result cap, unparsable time)
    #[error("Invalid filter: {0}")]
    InvalidCriteria(String),

    /// Record has no download locator
    #[error("Invalid video reference: {0} has no download URL")]
    InvalidVideoReference(String),

    /// Play requested with nothing selected
    #[error("Please select a video first")]
    NoSelection,

    #[error("Video query failed: {0}")]
    QueryTransport(ClientError),

    #[error("Video download failed: {0}")]
    DownloadTransport(ClientError),

    #[error("Failed to load media: {0}")]
    MediaLoad(MediaError),

    #[error("Playback session is not ready")]
    SessionNotReady,

    #[error("No open player for {0}")]
    UnknownSession(SessionId),
}

impl From<PlayerError> for BrowserError {
    fn from(e: PlayerError) -> Self {
        match e {
            PlayerError::MediaLoad(media) => Self::MediaLoad(media),
            PlayerError::SessionNotReady => Self::SessionNotReady,
        }
    }
}
