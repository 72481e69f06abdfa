// Data models exchanged with the video server

use serde::{Deserialize, Serialize};

use crate::format::{format_duration, format_file_size};

/// Metadata for one recorded clip, as returned by the video server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub device_id: String,
    #[serde(default)]
    pub error_log_id: String,
    /// Remote locator used for download
    #[serde(default)]
    pub http_url: String,
    /// Server-side path of the recording (display only)
    #[serde(default)]
    pub file_path: String,
    #[serde(rename = "file_size", default)]
    pub file_size_bytes: u64,
    #[serde(rename = "video_duration", default)]
    pub duration_millis: u64,
}

impl VideoRecord {
    /// Whether the record carries a usable download locator
    pub fn is_playable(&self) -> bool {
        !self.http_url.trim().is_empty()
    }

    /// One-line text for the result list: `[device] error - size (duration)`
    pub fn list_label(&self) -> String {
        format!(
            "[{}] {} - {} ({})",
            self.device_id,
            self.error_log_id,
            format_file_size(self.file_size_bytes),
            format_duration(self.duration_millis)
        )
    }

    /// Hover text for a list row
    pub fn tooltip(&self) -> String {
        format!(
            "Video URL: {}\nFile size: {}\nDuration: {}",
            self.http_url,
            format_file_size(self.file_size_bytes),
            format_duration(self.duration_millis)
        )
    }
}

/// Normalized query parameters sent to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoQuery {
    /// Empty means all devices
    pub device_id: String,
    /// Empty means unfiltered
    pub error_log_id: String,
    pub start_time_millis: i64,
    pub end_time_millis: i64,
    pub max_results: u32,
}

/// Download progress information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub percent: f32,
    pub status: String,
}
