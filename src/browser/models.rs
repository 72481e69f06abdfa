// Browser state models: filter criteria, query/download/selection state

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use time::{Duration, PrimitiveDateTime, UtcOffset};

use super::errors::BrowserError;
use crate::client::{VideoQuery, VideoRecord};
use crate::config::MAX_VIDEO_RESULTS;

/// Device filter entry meaning "no device filter"
pub const ALL_DEVICES: &str = "All Devices";

/// Default search window, counted back from now
pub const DEFAULT_SEARCH_DAYS: i64 = 7;

/// Which player topology the browser drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Topology {
    /// Every opened clip gets its own player window; downloads run concurrently
    #[default]
    MultiWindow,
    /// One embedded player; a newer open supersedes an in-flight download
    /// and replaces the current clip
    Inline,
}

/// Identity of one query or download request, monotonic per browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Search filter as entered by the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Empty or `ALL_DEVICES` = all devices
    pub device_id: String,
    /// Empty = unfiltered; surrounding whitespace is ignored
    pub error_log_id: String,
    pub start_time: PrimitiveDateTime,
    pub end_time: PrimitiveDateTime,
    pub max_results: u32,
    /// Offset the naive start and end times are read in
    pub utc_offset: UtcOffset,
}

impl FilterCriteria {
    pub fn new(start_time: PrimitiveDateTime, end_time: PrimitiveDateTime) -> Self {
        Self {
            device_id: String::new(),
            error_log_id: String::new(),
            start_time,
            end_time,
            max_results: MAX_VIDEO_RESULTS,
            utc_offset: UtcOffset::UTC,
        }
    }

    /// The last `days` days up to `now`, all devices
    pub fn last_days(now: PrimitiveDateTime, days: i64) -> Self {
        Self::new(now - Duration::days(days), now)
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn with_error_log_id(mut self, error_log_id: impl Into<String>) -> Self {
        self.error_log_id = error_log_id.into();
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Parse a filter time in `YYYY-MM-DD hh:mm` form
    pub fn parse_time(input: &str) -> Result<PrimitiveDateTime, BrowserError> {
        let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]");
        PrimitiveDateTime::parse(input.trim(), format)
            .map_err(|e| BrowserError::InvalidCriteria(format!("time '{}': {}", input, e)))
    }

    pub fn validate(&self) -> Result<(), BrowserError> {
        if self.start_time >= self.end_time {
            return Err(BrowserError::InvalidTimeRange {
                start: self.start_time,
                end: self.end_time,
            });
        }
        if self.max_results == 0 {
            return Err(BrowserError::InvalidCriteria(
                "max results must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Server query with the "all devices" sentinel and blanks normalized away
    pub fn to_query(&self) -> VideoQuery {
        let device = self.device_id.trim();
        let device_id = if device == ALL_DEVICES { "" } else { device };

        VideoQuery {
            device_id: device_id.to_string(),
            error_log_id: self.error_log_id.trim().to_string(),
            start_time_millis: epoch_millis(self.start_time, self.utc_offset),
            end_time_millis: epoch_millis(self.end_time, self.utc_offset),
            max_results: self.max_results,
        }
    }
}

fn epoch_millis(at: PrimitiveDateTime, offset: UtcOffset) -> i64 {
    (at.assume_offset(offset).unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryState {
    #[default]
    Idle,
    Querying,
    Ready(Vec<VideoRecord>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadState {
    Pending,
    InProgress(f32),
    Succeeded(PathBuf),
    Failed(String),
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    /// Record progress; terminal states never go back to `InProgress`
    pub fn advance(&mut self, percent: f32) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self = Self::InProgress(percent.clamp(0.0, 100.0));
        true
    }

    /// Enter a terminal state once; later calls are ignored
    pub fn finish(&mut self, outcome: DownloadState) -> bool {
        if self.is_terminal() || !outcome.is_terminal() {
            return false;
        }
        *self = outcome;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionState {
    pub index: Option<usize>,
    /// Whether the "Play Selected" affordance is enabled
    pub can_play: bool,
}
