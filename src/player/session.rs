// Playback session - one media engine bound to one local file

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::engine::MediaEngine;
use super::errors::PlayerError;
use crate::format::format_position_label;

/// Step used by the skip-backward / skip-forward buttons
pub const SKIP_STEP_MS: i64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackStatus {
    Playing,
    Paused,
}

impl PlaybackStatus {
    /// Text of the play/pause button: it shows the action, not the state
    pub fn transport_label(&self) -> &'static str {
        match self {
            Self::Playing => "⏸",
            Self::Paused => "▶",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Unloaded,
    Loaded(PlaybackStatus),
}

/// Read-only view handed to presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub local_path: Option<PathBuf>,
    pub position_millis: u64,
    pub duration_millis: u64,
    /// Value the seek bar should show; frozen while the user drags it
    pub slider_millis: u64,
    pub dragging: bool,
    pub status: Option<PlaybackStatus>,
    pub time_label: String,
}

pub struct PlaybackSession {
    id: SessionId,
    engine: Box<dyn MediaEngine>,
    local_path: Option<PathBuf>,
    state: SessionState,
    position_millis: u64,
    duration_millis: u64,
    slider_millis: u64,
    dragging: bool,
}

impl PlaybackSession {
    pub fn new(id: SessionId, engine: Box<dyn MediaEngine>) -> Self {
        Self {
            id,
            engine,
            local_path: None,
            state: SessionState::Unloaded,
            position_millis: 0,
            duration_millis: 0,
            slider_millis: 0,
            dragging: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Bind the engine to `path`, releasing whatever was loaded before.
    ///
    /// The session starts paused at position zero.
    pub fn load(&mut self, path: &Path) -> Result<(), PlayerError> {
        if self.is_loaded() {
            tracing::debug!("[Session] {} releasing {:?} before reload", self.id, self.local_path);
            self.engine.release();
        }
        self.reset();

        let info = self.engine.load(path)?;
        self.local_path = Some(path.to_path_buf());
        self.duration_millis = info.duration_millis.unwrap_or(0);
        self.state = SessionState::Loaded(PlaybackStatus::Paused);

        tracing::info!("[Session] {} loaded {}", self.id, path.display());
        Ok(())
    }

    pub fn play(&mut self) -> Result<(), PlayerError> {
        self.ensure_loaded()?;
        self.engine.play();
        self.state = SessionState::Loaded(PlaybackStatus::Playing);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), PlayerError> {
        self.ensure_loaded()?;
        self.engine.pause();
        self.state = SessionState::Loaded(PlaybackStatus::Paused);
        Ok(())
    }

    /// Toggle between playing and paused; returns the new status
    pub fn play_pause(&mut self) -> Result<PlaybackStatus, PlayerError> {
        match self.state {
            SessionState::Unloaded => Err(PlayerError::SessionNotReady),
            SessionState::Loaded(PlaybackStatus::Playing) => {
                self.pause()?;
                Ok(PlaybackStatus::Paused)
            }
            SessionState::Loaded(PlaybackStatus::Paused) => {
                self.play()?;
                Ok(PlaybackStatus::Playing)
            }
        }
    }

    /// Move by `delta_millis`, clamped to `[0, duration]`
    pub fn seek_relative(&mut self, delta_millis: i64) -> Result<u64, PlayerError> {
        self.ensure_loaded()?;
        let target = (self.position_millis as i128 + delta_millis as i128)
            .clamp(0, self.duration_millis as i128) as u64;
        Ok(self.apply_seek(target))
    }

    pub fn seek_absolute(&mut self, position_millis: u64) -> Result<u64, PlayerError> {
        self.ensure_loaded()?;
        Ok(self.apply_seek(position_millis.min(self.duration_millis)))
    }

    pub fn skip_backward(&mut self) -> Result<u64, PlayerError> {
        self.seek_relative(-SKIP_STEP_MS)
    }

    pub fn skip_forward(&mut self) -> Result<u64, PlayerError> {
        self.seek_relative(SKIP_STEP_MS)
    }

    /// User pressed the seek bar handle
    pub fn begin_drag(&mut self) -> Result<(), PlayerError> {
        self.ensure_loaded()?;
        self.dragging = true;
        Ok(())
    }

    /// User moved the handle; the engine follows the drag
    pub fn drag_to(&mut self, position_millis: u64) -> Result<u64, PlayerError> {
        let target = self.seek_absolute(position_millis)?;
        self.slider_millis = target;
        Ok(target)
    }

    /// User released the handle; engine notifications drive the bar again
    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    /// Engine reported a new playback position
    pub fn on_position_changed(&mut self, position_millis: u64) {
        if !self.is_loaded() {
            return;
        }
        self.position_millis = position_millis;
        if !self.dragging {
            self.slider_millis = position_millis;
        }
    }

    /// Engine reported the clip duration (often only after loading)
    pub fn on_duration_changed(&mut self, duration_millis: u64) {
        if !self.is_loaded() {
            return;
        }
        self.duration_millis = duration_millis;
        self.position_millis = self.position_millis.min(duration_millis);
        self.slider_millis = self.slider_millis.min(duration_millis);
    }

    /// Release the media resource; the session can be loaded again
    pub fn close(&mut self) {
        if self.is_loaded() {
            self.engine.release();
            tracing::info!("[Session] {} closed", self.id);
        }
        self.reset();
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, SessionState::Loaded(_))
    }

    pub fn status(&self) -> Option<PlaybackStatus> {
        match self.state {
            SessionState::Loaded(status) => Some(status),
            SessionState::Unloaded => None,
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    pub fn position_millis(&self) -> u64 {
        self.position_millis
    }

    pub fn duration_millis(&self) -> u64 {
        self.duration_millis
    }

    /// `MM:SS / MM:SS`
    pub fn time_label(&self) -> String {
        format_position_label(self.position_millis, self.duration_millis)
    }

    /// `▶` when paused or unloaded, `⏸` while playing
    pub fn transport_label(&self) -> &'static str {
        self.status()
            .unwrap_or(PlaybackStatus::Paused)
            .transport_label()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            local_path: self.local_path.clone(),
            position_millis: self.position_millis,
            duration_millis: self.duration_millis,
            slider_millis: self.slider_millis,
            dragging: self.dragging,
            status: self.status(),
            time_label: self.time_label(),
        }
    }

    fn ensure_loaded(&self) -> Result<(), PlayerError> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(PlayerError::SessionNotReady)
        }
    }

    fn apply_seek(&mut self, target: u64) -> u64 {
        self.engine.set_position(target);
        self.position_millis = target;
        if !self.dragging {
            self.slider_millis = target;
        }
        target
    }

    fn reset(&mut self) {
        self.local_path = None;
        self.state = SessionState::Unloaded;
        self.position_millis = 0;
        self.duration_millis = 0;
        self.slider_millis = 0;
        self.dragging = false;
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("local_path", &self.local_path)
            .field("state", &self.state)
            .field("position_millis", &self.position_millis)
            .field("duration_millis", &self.duration_millis)
            .finish_non_exhaustive()
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.close();
    }
}
