// Media engine contract and the headless engine used outside a GUI

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Container formats the headless engine accepts
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["mp4", "mkv", "avi", "mov", "webm", "m4v"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("Media file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported media format: {0}")]
    Unsupported(String),
}

/// What the engine learned while opening a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaInfo {
    /// Known up front for some engines; others report it later
    pub duration_millis: Option<u64>,
}

/// A decode/render pipeline bound to at most one file at a time.
///
/// Implementations belong to the host toolkit; the session only drives
/// transport and listens for position/duration notifications.
pub trait MediaEngine: Send {
    fn load(&mut self, path: &Path) -> Result<MediaInfo, MediaError>;
    fn play(&mut self);
    fn pause(&mut self);
    fn set_position(&mut self, millis: u64);
    /// Drop the decoded resource; the engine may be loaded again afterwards
    fn release(&mut self);
}

/// Engine without video output.
///
/// Validates the file, remembers transport commands and reports the duration
/// given by the clip's metadata.
#[derive(Debug, Default)]
pub struct HeadlessEngine {
    duration_hint: Option<u64>,
    loaded: Option<PathBuf>,
    playing: bool,
    position: u64,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration_hint(millis: u64) -> Self {
        Self {
            duration_hint: Some(millis),
            ..Self::default()
        }
    }

    pub fn loaded_path(&self) -> Option<&Path> {
        self.loaded.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

impl MediaEngine for HeadlessEngine {
    fn load(&mut self, path: &Path) -> Result<MediaInfo, MediaError> {
        if !path.is_file() {
            return Err(MediaError::NotFound(path.to_path_buf()));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(MediaError::Unsupported(path.display().to_string()));
        }

        self.loaded = Some(path.to_path_buf());
        self.playing = false;
        self.position = 0;
        Ok(MediaInfo {
            duration_millis: self.duration_hint,
        })
    }

    fn play(&mut self) {
        self.playing = self.loaded.is_some();
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn set_position(&mut self, millis: u64) {
        self.position = millis;
    }

    fn release(&mut self) {
        self.loaded = None;
        self.playing = false;
        self.position = 0;
    }
}
