//! Controls visibility state machine
//!
//! ```text
//!   Visible ──hide(animate)──► FadingOut ──200ms──► Hidden
//!      ▲                                              │
//!      └──── 200ms ◄── FadingIn ◄──show(animate)──────┘
//! ```
//!
//! Non-animated transitions jump straight to the end state. A show during a
//! fade-out (or hide during a fade-in) cancels the running fade.

use std::time::Duration;

use crate::timer::TimerId;
use crate::types::{ControlsEvent, ReadyState};

/// Length of the fade animation
pub const FADE_DURATION: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
    FadingIn,
    FadingOut,
}

impl Visibility {
    /// Visible or on the way there
    pub fn is_visible(&self) -> bool {
        matches!(self, Visibility::Visible | Visibility::FadingIn)
    }
}

/// Conditions under which a hide request is refused
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HideGuard {
    pub always_show_controls: bool,
    pub keyboard_action: bool,
    pub is_video: bool,
    pub paused: bool,
    pub ended: bool,
    pub ready_state: ReadyState,
    pub current_time: f64,
    pub hide_on_load: bool,
    pub hide_on_pause: bool,
}

impl HideGuard {
    pub fn blocks_hide(&self) -> bool {
        if self.always_show_controls || self.keyboard_action || self.ended {
            return true;
        }
        let paused_and_loaded = self.paused
            && self.ready_state == ReadyState::HaveEnoughData
            && ((!self.hide_on_load && self.current_time <= 0.0)
                || (!self.hide_on_pause && self.current_time > 0.0));
        let video_not_loaded =
            self.is_video && self.ready_state == ReadyState::HaveNothing && !self.hide_on_load;
        paused_and_loaded || video_not_loaded
    }
}

/// Visibility state plus the timer slots that drive it
#[derive(Debug)]
pub struct ControlsVisibility {
    state: Visibility,
    enabled: bool,
    hide_timer: Option<TimerId>,
    fade_timer: Option<TimerId>,
}

impl Default for ControlsVisibility {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlsVisibility {
    /// Controls start visible and enabled
    pub fn new() -> Self {
        Self {
            state: Visibility::Visible,
            enabled: true,
            hide_timer: None,
            fade_timer: None,
        }
    }

    pub fn state(&self) -> Visibility {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state.is_visible()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn should_show(&self) -> bool {
        !self.is_visible()
    }

    pub fn should_hide(&self, guard: &HideGuard) -> bool {
        self.is_visible() && !guard.blocks_hide()
    }

    /// Enter the shown state; returns the event to emit now, if any
    pub fn begin_show(&mut self, animate: bool) -> Option<ControlsEvent> {
        if animate {
            self.state = Visibility::FadingIn;
            None
        } else {
            self.state = Visibility::Visible;
            Some(ControlsEvent::Shown)
        }
    }

    /// Enter the hidden state; returns the event to emit now, if any
    pub fn begin_hide(&mut self, animate: bool) -> Option<ControlsEvent> {
        if animate {
            self.state = Visibility::FadingOut;
            None
        } else {
            self.state = Visibility::Hidden;
            Some(ControlsEvent::Hidden)
        }
    }

    /// Complete a running fade
    pub fn finish_fade(&mut self) -> Option<ControlsEvent> {
        self.fade_timer = None;
        match self.state {
            Visibility::FadingIn => {
                self.state = Visibility::Visible;
                Some(ControlsEvent::Shown)
            }
            Visibility::FadingOut => {
                self.state = Visibility::Hidden;
                Some(ControlsEvent::Hidden)
            }
            _ => None,
        }
    }

    /// Store a new auto-hide timer, returning the one it replaces
    pub fn replace_hide_timer(&mut self, timer: TimerId) -> Option<TimerId> {
        self.hide_timer.replace(timer)
    }

    pub fn take_hide_timer(&mut self) -> Option<TimerId> {
        self.hide_timer.take()
    }

    pub fn hide_timer(&self) -> Option<TimerId> {
        self.hide_timer
    }

    pub fn replace_fade_timer(&mut self, timer: TimerId) -> Option<TimerId> {
        self.fade_timer.replace(timer)
    }

    pub fn take_fade_timer(&mut self) -> Option<TimerId> {
        self.fade_timer.take()
    }
}
