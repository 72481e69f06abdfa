// Auto-hide transport overlay for the inline player

use std::time::Duration;

use tokio::time::Instant;

/// Quiet period after which the controls hide
pub const HIDE_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayVisibility {
    Visible,
    Hidden,
}

/// Two-state overlay with a restartable hide countdown.
///
/// Callers pass the current instant to every transition, so the countdown is
/// plain data: `deadline()` tells a presentation loop when to call `poll`.
#[derive(Debug, Clone)]
pub struct ControlOverlay {
    visibility: OverlayVisibility,
    deadline: Option<Instant>,
    hide_delay: Duration,
}

impl Default for ControlOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlOverlay {
    pub fn new() -> Self {
        Self::with_hide_delay(HIDE_DELAY)
    }

    pub fn with_hide_delay(hide_delay: Duration) -> Self {
        Self {
            visibility: OverlayVisibility::Hidden,
            deadline: None,
            hide_delay,
        }
    }

    pub fn pointer_enter(&mut self, now: Instant) {
        self.show(now);
    }

    pub fn pointer_move(&mut self, now: Instant) {
        self.show(now);
    }

    /// Restart the countdown without hiding, so short excursions don't flicker
    pub fn pointer_leave(&mut self, now: Instant) {
        self.deadline = Some(now + self.hide_delay);
    }

    pub fn playback_started(&mut self, now: Instant) {
        self.show(now);
    }

    /// Surface resized; a visible overlay is re-shown so it can be repositioned.
    /// Returns whether the overlay needs repositioning.
    pub fn resize(&mut self, now: Instant) -> bool {
        if self.is_visible() {
            self.show(now);
            true
        } else {
            false
        }
    }

    /// Apply an expired countdown and return the current visibility
    pub fn poll(&mut self, now: Instant) -> OverlayVisibility {
        if let Some(deadline) = self.deadline {
            if now >= deadline {
                self.deadline = None;
                if self.visibility == OverlayVisibility::Visible {
                    tracing::trace!("[Overlay] hide after {:?} idle", self.hide_delay);
                }
                self.visibility = OverlayVisibility::Hidden;
            }
        }
        self.visibility
    }

    /// Hide immediately and cancel the countdown
    pub fn hide(&mut self) {
        self.deadline = None;
        self.visibility = OverlayVisibility::Hidden;
    }

    /// Wait until the pending countdown expires, then apply it.
    /// Returns immediately when no countdown is running.
    pub async fn wait_for_deadline(&mut self) -> OverlayVisibility {
        if let Some(deadline) = self.deadline {
            tokio::time::sleep_until(deadline).await;
            return self.poll(Instant::now());
        }
        self.visibility
    }

    pub fn visibility(&self) -> OverlayVisibility {
        self.visibility
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == OverlayVisibility::Visible
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn show(&mut self, now: Instant) {
        self.visibility = OverlayVisibility::Visible;
        self.deadline = Some(now + self.hide_delay);
    }
}
