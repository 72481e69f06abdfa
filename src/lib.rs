//! Factory video client core.
//!
//! Queries the video server for clips recorded around device error-log
//! events, downloads a chosen clip and drives its playback session. The GUI
//! toolkit and the media decoder are supplied by the host application through
//! [`player::MediaEngine`] and by reading controller snapshots.

pub mod browser;
pub mod client;
pub mod config;
pub mod format;
pub mod player;

#[cfg(test)]
mod testing;

pub use browser::{BrowserError, FilterCriteria, Topology, VideoBrowserController};
pub use client::{HttpVideoClient, VideoRecord};
pub use config::ClientConfig;
pub use format::{format_duration, format_file_size, format_position_label};
