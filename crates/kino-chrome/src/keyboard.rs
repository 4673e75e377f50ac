//! Keyboard action table
//!
//! A player's `keyActions` is an ordered list of key sets. When the player
//! holds focus the first entry containing the pressed key code runs and
//! dispatch stops.

use std::fmt;
use std::rc::Rc;

use serde::Deserialize;

use crate::command::{CommandQueue, PlayerCommand};
use crate::config::SeekInterval;
use crate::dom::DomEvent;
use crate::media::MediaElement;
use crate::types::PlayerId;

/// Key codes used by the default table
pub mod codes {
    pub const SPACE: u32 = 32;
    pub const MEDIA_PLAY_PAUSE: u32 = 179;
    pub const LEFT: u32 = 37;
    pub const UP: u32 = 38;
    pub const RIGHT: u32 = 39;
    pub const DOWN: u32 = 40;
    pub const F: u32 = 70;
    pub const M: u32 = 77;
    pub const GOOGLE_TV_REWIND: u32 = 227;
    pub const GOOGLE_TV_FORWARD: u32 = 228;
}

/// Volume change per key press
pub const VOLUME_STEP: f64 = 0.1;

pub type CustomKeyAction = Rc<dyn Fn(&mut KeyContext<'_>)>;

/// What a key set does
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyCommand {
    PlayPause,
    VolumeUp,
    VolumeDown,
    SeekBackward,
    SeekForward,
    ToggleFullscreen,
    ToggleMute,
    #[serde(skip)]
    Custom(CustomKeyAction),
}

impl fmt::Debug for KeyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyCommand::PlayPause => "PlayPause",
            KeyCommand::VolumeUp => "VolumeUp",
            KeyCommand::VolumeDown => "VolumeDown",
            KeyCommand::SeekBackward => "SeekBackward",
            KeyCommand::SeekForward => "SeekForward",
            KeyCommand::ToggleFullscreen => "ToggleFullscreen",
            KeyCommand::ToggleMute => "ToggleMute",
            KeyCommand::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

impl KeyCommand {
    pub fn custom(action: impl Fn(&mut KeyContext<'_>) + 'static) -> Self {
        KeyCommand::Custom(Rc::new(action))
    }

    pub fn name(&self) -> &'static str {
        match self {
            KeyCommand::PlayPause => "playPause",
            KeyCommand::VolumeUp => "volumeUp",
            KeyCommand::VolumeDown => "volumeDown",
            KeyCommand::SeekBackward => "seekBackward",
            KeyCommand::SeekForward => "seekForward",
            KeyCommand::ToggleFullscreen => "toggleFullscreen",
            KeyCommand::ToggleMute => "toggleMute",
            KeyCommand::Custom(_) => "custom",
        }
    }

    pub fn execute(&self, ctx: &mut KeyContext<'_>) {
        match self {
            KeyCommand::PlayPause => {
                if ctx.media.paused() || ctx.media.ended() {
                    ctx.media.play();
                } else {
                    ctx.media.pause();
                }
            }
            KeyCommand::VolumeUp => {
                ctx.request(PlayerCommand::RevealVolumeSlider { only_if_focused: true });
                ctx.reveal_controls();
                let volume = step_volume(ctx.media.volume(), VOLUME_STEP);
                ctx.media.set_volume(volume);
                if volume > 0.0 {
                    ctx.media.set_muted(false);
                }
            }
            KeyCommand::VolumeDown => {
                ctx.request(PlayerCommand::RevealVolumeSlider { only_if_focused: true });
                ctx.reveal_controls();
                let volume = step_volume(ctx.media.volume(), -VOLUME_STEP);
                ctx.media.set_volume(volume);
                if volume <= VOLUME_STEP {
                    ctx.media.set_muted(true);
                }
            }
            KeyCommand::SeekBackward => {
                let duration = ctx.media.duration();
                if duration.is_finite() && duration > 0.0 {
                    ctx.reveal_controls();
                    let step = ctx.seek_backward.resolve(duration);
                    let time = (ctx.media.current_time() - step).max(0.0);
                    ctx.media.set_current_time(time);
                }
            }
            KeyCommand::SeekForward => {
                let duration = ctx.media.duration();
                if duration.is_finite() && duration > 0.0 {
                    ctx.reveal_controls();
                    let step = ctx.seek_forward.resolve(duration);
                    let time = (ctx.media.current_time() + step).min(duration);
                    ctx.media.set_current_time(time);
                }
            }
            KeyCommand::ToggleFullscreen => {
                if ctx.event.modifiers.any() || !ctx.fullscreen_available {
                    return;
                }
                ctx.request(if ctx.is_fullscreen {
                    PlayerCommand::ExitFullscreen
                } else {
                    PlayerCommand::EnterFullscreen
                });
            }
            KeyCommand::ToggleMute => {
                ctx.request(PlayerCommand::RevealVolumeSlider { only_if_focused: false });
                ctx.reveal_controls();
                ctx.media.set_muted(!ctx.media.muted());
            }
            KeyCommand::Custom(action) => action(ctx),
        }
    }
}

fn step_volume(current: f64, step: f64) -> f64 {
    let current = if current.is_finite() { current } else { 0.0 };
    (current + step).clamp(0.0, 1.0)
}

/// An entry in the key table
#[derive(Debug, Clone, Deserialize)]
pub struct KeyAction {
    pub keys: Vec<u32>,
    pub action: KeyCommand,
}

impl KeyAction {
    pub fn new(keys: impl Into<Vec<u32>>, action: KeyCommand) -> Self {
        Self {
            keys: keys.into(),
            action,
        }
    }
}

/// The built-in table
pub fn default_key_actions() -> Vec<KeyAction> {
    use codes::*;
    vec![
        KeyAction::new([SPACE, MEDIA_PLAY_PAUSE], KeyCommand::PlayPause),
        KeyAction::new([UP], KeyCommand::VolumeUp),
        KeyAction::new([DOWN], KeyCommand::VolumeDown),
        KeyAction::new([LEFT, GOOGLE_TV_REWIND], KeyCommand::SeekBackward),
        KeyAction::new([RIGHT, GOOGLE_TV_FORWARD], KeyCommand::SeekForward),
        KeyAction::new([F], KeyCommand::ToggleFullscreen),
        KeyAction::new([M], KeyCommand::ToggleMute),
    ]
}

/// First entry whose key set contains `key_code`
pub fn find_action(actions: &[KeyAction], key_code: u32) -> Option<&KeyAction> {
    actions.iter().find(|a| a.keys.contains(&key_code))
}

/// What a key action gets to work with
pub struct KeyContext<'a> {
    pub player: PlayerId,
    pub media: &'a dyn MediaElement,
    pub event: &'a DomEvent,
    pub key_code: u32,
    pub is_video: bool,
    pub is_fullscreen: bool,
    pub fullscreen_available: bool,
    pub seek_backward: SeekInterval,
    pub seek_forward: SeekInterval,
    commands: CommandQueue,
}

impl<'a> KeyContext<'a> {
    pub fn new(player: PlayerId, media: &'a dyn MediaElement, event: &'a DomEvent, key_code: u32) -> Self {
        Self {
            player,
            media,
            event,
            key_code,
            is_video: true,
            is_fullscreen: false,
            fullscreen_available: false,
            seek_backward: SeekInterval::default(),
            seek_forward: SeekInterval::default(),
            commands: CommandQueue::new(),
        }
    }

    pub fn request(&mut self, command: PlayerCommand) {
        self.commands.push(command);
    }

    /// Show video controls and restart the auto-hide timer
    pub fn reveal_controls(&mut self) {
        if self.is_video {
            self.request(PlayerCommand::ShowControls { animate: true });
            self.request(PlayerCommand::StartControlsTimer(None));
        }
    }

    pub fn into_commands(mut self) -> Vec<PlayerCommand> {
        self.commands.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, Modifiers};
    use crate::media::SimulatedMedia;

    fn key_event(code: u32) -> DomEvent {
        let doc = Document::new();
        DomEvent::key_down(doc.body(), code)
    }

    #[test]
    fn test_first_match_wins() {
        let actions = vec![
            KeyAction::new([32], KeyCommand::ToggleMute),
            KeyAction::new([32, 77], KeyCommand::PlayPause),
        ];
        assert_eq!(find_action(&actions, 32).map(|a| a.action.name()), Some("toggleMute"));
        assert_eq!(find_action(&actions, 77).map(|a| a.action.name()), Some("playPause"));
        assert!(find_action(&actions, 1).is_none());
    }

    #[test]
    fn test_volume_down_settles_at_zero_muted() {
        let media = SimulatedMedia::native();
        media.set_volume(0.05);
        let event = key_event(codes::DOWN);
        for _ in 0..3 {
            let mut ctx = KeyContext::new(PlayerId(0), &media, &event, codes::DOWN);
            KeyCommand::VolumeDown.execute(&mut ctx);
        }
        assert_eq!(media.volume(), 0.0);
        assert!(media.muted());
    }

    #[test]
    fn test_volume_up_unmutes_and_clamps() {
        let media = SimulatedMedia::native();
        media.set_volume(0.95);
        media.set_muted(true);
        let event = key_event(codes::UP);
        let mut ctx = KeyContext::new(PlayerId(0), &media, &event, codes::UP);
        KeyCommand::VolumeUp.execute(&mut ctx);
        assert_eq!(media.volume(), 1.0);
        assert!(!media.muted());

        let commands = ctx.into_commands();
        assert!(commands.contains(&PlayerCommand::ShowControls { animate: true }));
    }

    #[test]
    fn test_seek_ignored_without_duration() {
        let media = SimulatedMedia::native();
        let event = key_event(codes::RIGHT);
        let mut ctx = KeyContext::new(PlayerId(0), &media, &event, codes::RIGHT);
        KeyCommand::SeekForward.execute(&mut ctx);
        assert_eq!(media.current_time(), 0.0);
        assert!(ctx.into_commands().is_empty());
    }

    #[test]
    fn test_seek_uses_duration_fraction() {
        let media = SimulatedMedia::native();
        media.load_metadata(200.0, None);
        media.set_current_time(100.0);
        let event = key_event(codes::LEFT);
        let mut ctx = KeyContext::new(PlayerId(0), &media, &event, codes::LEFT);
        KeyCommand::SeekBackward.execute(&mut ctx);
        assert_eq!(media.current_time(), 90.0);
    }

    #[test]
    fn test_fullscreen_ignored_with_modifier() {
        let media = SimulatedMedia::native();
        let event = key_event(codes::F).with_modifiers(Modifiers {
            ctrl: true,
            ..Default::default()
        });
        let mut ctx = KeyContext::new(PlayerId(0), &media, &event, codes::F);
        ctx.fullscreen_available = true;
        KeyCommand::ToggleFullscreen.execute(&mut ctx);
        assert!(ctx.into_commands().is_empty());
    }

    #[test]
    fn test_key_actions_from_json() {
        let actions: Vec<KeyAction> =
            serde_json::from_str(r#"[{"keys":[75],"action":"playPause"}]"#).unwrap();
        assert_eq!(actions[0].keys, vec![75]);
        assert_eq!(actions[0].action.name(), "playPause");
    }
}
