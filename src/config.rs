// Client configuration: server location, network settings, local storage

use std::path::PathBuf;

use thiserror::Error;
use time::UtcOffset;

/// Devices offered in the device filter when nothing else is configured
pub const KNOWN_DEVICES: [&str; 2] = ["feeder_01", "conveyor_01"];

/// Default cap on results per query
pub const MAX_VIDEO_RESULTS: u32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Configuration for the video server client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the video server (e.g., "http://10.0.0.5:8080")
    pub server_url: String,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Where downloaded clips are stored
    pub download_dir: PathBuf,
    /// Result cap used when a filter does not set one
    pub max_results: u32,
    /// Device ids offered in the device filter
    pub devices: Vec<String>,
    /// Offset of the operator's wall clock; filter times are entered in it
    pub utc_offset: UtcOffset,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            proxy: None,
            timeout_seconds: 30,
            download_dir: dirs::download_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("factory-videos"),
            max_results: MAX_VIDEO_RESULTS,
            devices: KNOWN_DEVICES.iter().map(|d| d.to_string()).collect(),
            utc_offset: local_offset(),
        }
    }
}

/// The system's local offset, or UTC when it cannot be determined.
///
/// Unix systems only report it while the process is single-threaded.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// Parse an offset in `+hh:mm` / `-hh:mm` form
pub fn parse_utc_offset(input: &str) -> Option<UtcOffset> {
    let format = time::macros::format_description!("[offset_hour sign:mandatory]:[offset_minute]");
    UtcOffset::parse(input.trim(), format).ok()
}

impl ClientConfig {
    /// Defaults overridden by `FACTORY_VIDEO_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("FACTORY_VIDEO_SERVER") {
            config.server_url = url;
        }
        if let Some(proxy) = lookup("FACTORY_VIDEO_PROXY").filter(|p| !p.is_empty()) {
            config.proxy = Some(proxy);
        }
        if let Some(raw) = lookup("FACTORY_VIDEO_TIMEOUT") {
            config.timeout_seconds = raw.parse().map_err(|_| ConfigError::InvalidValue {
                var: "FACTORY_VIDEO_TIMEOUT",
                value: raw.clone(),
            })?;
        }
        if let Some(dir) = lookup("FACTORY_VIDEO_DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("FACTORY_VIDEO_MAX_RESULTS") {
            config.max_results = raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    var: "FACTORY_VIDEO_MAX_RESULTS",
                    value: raw.clone(),
                })?;
        }
        if let Some(raw) = lookup("FACTORY_VIDEO_DEVICES") {
            config.devices = raw
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = lookup("FACTORY_VIDEO_UTC_OFFSET") {
            config.utc_offset = parse_utc_offset(&raw).ok_or_else(|| ConfigError::InvalidValue {
                var: "FACTORY_VIDEO_UTC_OFFSET",
                value: raw.clone(),
            })?;
        }

        Ok(config)
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Absolute URL for an API path on the configured server
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
