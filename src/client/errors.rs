// Error types for the video server client

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Video server did not answer within the configured timeout
    #[error("Network timeout: video server is not responding")]
    Timeout,

    /// Server answered with a non-success HTTP status
    #[error("Server returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// TCP/TLS connection could not be established
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Malformed server URL or video URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to decode the server's JSON response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Local file could not be written
    #[error("I/O error: {0}")]
    Io(String),

    /// Unknown error with details
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }

        if let Some(status) = e.status() {
            return Self::Status {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            };
        }

        if e.is_connect() {
            return Self::Connect(e.to_string());
        }

        if e.is_decode() {
            return Self::Parse(e.to_string());
        }

        if e.is_builder() {
            return Self::InvalidUrl(e.to_string());
        }

        Self::Unknown(e.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
