//! Player-level effects requested by features and key actions.
//!
//! Features and key actions only see the document and the media element.
//! Anything that touches player state goes through a [`PlayerCommand`] which
//! the player applies once the hook returns.

use std::time::Duration;

use crate::dom::{DomEvent, NodeId};
use crate::media::MediaError;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Play,
    Pause,
    /// Play if paused or ended, pause otherwise
    TogglePlayback,
    SeekTo(f64),
    ToggleMute,
    ShowControls { animate: bool },
    HideControls { animate: bool },
    /// Restart the auto-hide timer; `None` uses `controlsTimeoutDefault`
    StartControlsTimer(Option<Duration>),
    KillControlsTimer,
    SetFocus(bool),
    SetKeyboardAction(bool),
    /// Run the key action table for this event
    KeyDown(DomEvent),
    HandleError(MediaError),
    ToggleFullscreen,
    EnterFullscreen,
    ExitFullscreen,
    /// The fullscreen control is built
    RegisterFullscreen,
    RegisterRail { rail: NodeId, total: NodeId },
    ClearRail,
    RegisterVolumeSlider(NodeId),
    RevealVolumeSlider { only_if_focused: bool },
    SetControlsSize,
}

/// Ordered command buffer handed to hooks
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Vec<PlayerCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: PlayerCommand) {
        self.commands.push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerCommand> {
        self.commands.iter()
    }

    pub fn drain(&mut self) -> Vec<PlayerCommand> {
        std::mem::take(&mut self.commands)
    }
}
