//! Player configuration
//!
//! Options use the camelCase names found in a node's `data-mejsoptions`
//! attribute. Missing keys take defaults and unknown keys are ignored.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dom::{Document, NodeId};
use crate::keyboard::{default_key_actions, KeyAction};
use crate::media::{MediaElement, MediaError};
use crate::timefmt::derive_time_format;
use crate::types::{Dimension, Platform, PlayerId, StretchingMode};
use crate::{Error, Result};

/// Attribute holding inline JSON options
pub const OPTIONS_ATTRIBUTE: &str = "data-mejsoptions";

/// Seek distance for the arrow keys
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeekInterval {
    /// Fraction of the media duration
    Fraction(f64),
    /// Fixed number of seconds
    Seconds(f64),
}

impl Default for SeekInterval {
    fn default() -> Self {
        SeekInterval::Fraction(0.05)
    }
}

impl SeekInterval {
    pub fn resolve(&self, duration: f64) -> f64 {
        let step = match self {
            SeekInterval::Fraction(f) => duration * f,
            SeekInterval::Seconds(s) => *s,
        };
        if step.is_finite() {
            step.max(0.0)
        } else {
            0.0
        }
    }
}

/// Arguments passed to `success`/`error` callbacks
pub enum CallbackArgs<'a> {
    Success {
        player: PlayerId,
        node: NodeId,
        media: &'a dyn MediaElement,
    },
    Error {
        player: PlayerId,
        error: &'a MediaError,
    },
}

pub type CallbackFn = Rc<dyn Fn(&CallbackArgs<'_>)>;

/// A callback given directly or by name
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub enum Callback {
    Direct(CallbackFn),
    /// Resolved through the [`CallbackTable`] at call time
    Named(String),
}

impl From<String> for Callback {
    fn from(name: String) -> Self {
        Callback::Named(name)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Direct(_) => f.write_str("Callback::Direct"),
            Callback::Named(name) => write!(f, "Callback::Named({:?})", name),
        }
    }
}

impl Callback {
    pub fn new(f: impl Fn(&CallbackArgs<'_>) + 'static) -> Self {
        Callback::Direct(Rc::new(f))
    }
}

/// Named callbacks available to string-valued `success`/`error` options
#[derive(Default)]
pub struct CallbackTable {
    entries: RefCell<HashMap<String, CallbackFn>>,
}

impl fmt::Debug for CallbackTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.entries.borrow().keys().cloned().collect();
        f.debug_struct("CallbackTable").field("names", &names).finish()
    }
}

impl CallbackTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, f: impl Fn(&CallbackArgs<'_>) + 'static) {
        self.entries.borrow_mut().insert(name.into(), Rc::new(f));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    /// Call `callback`. Returns false when a named callback isn't registered.
    pub fn invoke(&self, callback: &Callback, args: &CallbackArgs<'_>) -> bool {
        let f = match callback {
            Callback::Direct(f) => Rc::clone(f),
            Callback::Named(name) => match self.entries.borrow().get(name) {
                Some(f) => Rc::clone(f),
                None => {
                    warn!(callback = %name, "Named callback is not registered");
                    return false;
                }
            },
        };
        f(args);
        true
    }
}

/// Construction-time player options
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    /// Poster URL; falls back to the node's `poster` attribute
    pub poster: String,
    pub show_poster_when_ended: bool,
    pub show_poster_when_paused: bool,

    pub default_video_width: f64,
    pub default_video_height: f64,
    /// Forced video width; only positive lengths or percentages apply
    pub video_width: Option<Dimension>,
    pub video_height: Option<Dimension>,
    pub default_audio_width: f64,
    pub default_audio_height: f64,
    pub audio_width: Option<Dimension>,
    pub audio_height: Option<Dimension>,
    /// Disable to leave sizing to the host's CSS
    pub set_dimensions: bool,
    pub stretching: StretchingMode,

    pub default_seek_backward_interval: SeekInterval,
    pub default_seek_forward_interval: SeekInterval,

    pub start_volume: f64,
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    pub auto_rewind: bool,
    pub enable_autosize: bool,

    /// Empty means derived from `always_show_hours`/`show_timecode_frame_count`
    pub time_format: String,
    pub always_show_hours: bool,
    pub show_timecode_frame_count: bool,
    pub frames_per_second: u32,

    pub always_show_controls: bool,
    pub hide_video_controls_on_load: bool,
    pub hide_video_controls_on_pause: bool,
    pub click_to_play_pause: bool,
    /// Milliseconds
    pub controls_timeout_default: u64,
    pub controls_timeout_mouse_enter: u64,
    pub controls_timeout_mouse_leave: u64,

    #[serde(rename = "iPadUseNativeControls")]
    pub ipad_use_native_controls: bool,
    #[serde(rename = "iPhoneUseNativeControls")]
    pub iphone_use_native_controls: bool,
    #[serde(rename = "AndroidUseNativeControls")]
    pub android_use_native_controls: bool,

    pub features: Vec<String>,
    pub is_video: bool,
    pub class_prefix: String,

    pub enable_keyboard: bool,
    pub pause_other_players: bool,
    pub key_actions: Vec<KeyAction>,

    pub success: Option<Callback>,
    pub error: Option<Callback>,

    pub platform: Platform,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poster: String::new(),
            show_poster_when_ended: false,
            show_poster_when_paused: false,
            default_video_width: 480.0,
            default_video_height: 270.0,
            video_width: None,
            video_height: None,
            default_audio_width: 400.0,
            default_audio_height: 40.0,
            audio_width: None,
            audio_height: None,
            set_dimensions: true,
            stretching: StretchingMode::Auto,
            default_seek_backward_interval: SeekInterval::default(),
            default_seek_forward_interval: SeekInterval::default(),
            start_volume: 0.8,
            loop_playback: false,
            auto_rewind: true,
            enable_autosize: true,
            time_format: String::new(),
            always_show_hours: false,
            show_timecode_frame_count: false,
            frames_per_second: 25,
            always_show_controls: false,
            hide_video_controls_on_load: false,
            hide_video_controls_on_pause: false,
            click_to_play_pause: true,
            controls_timeout_default: 1500,
            controls_timeout_mouse_enter: 2500,
            controls_timeout_mouse_leave: 1000,
            ipad_use_native_controls: false,
            iphone_use_native_controls: false,
            android_use_native_controls: false,
            features: ["playpause", "current", "progress", "duration", "tracks", "volume", "fullscreen"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            is_video: true,
            class_prefix: "mejs__".to_string(),
            enable_keyboard: true,
            pause_other_players: true,
            key_actions: default_key_actions(),
            success: None,
            error: None,
            platform: Platform::default(),
        }
    }
}

impl PlayerConfig {
    /// Parse JSON overrides onto the defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject options the player cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.frames_per_second == 0 {
            return Err(Error::InvalidConfig("framesPerSecond must be positive".to_string()));
        }
        let defaults = [
            ("defaultVideoWidth", self.default_video_width),
            ("defaultVideoHeight", self.default_video_height),
            ("defaultAudioWidth", self.default_audio_width),
            ("defaultAudioHeight", self.default_audio_height),
        ];
        for (name, value) in defaults {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig(format!("{} must be a positive number, got {}", name, value)));
            }
        }
        if !(0.0..=1.0).contains(&self.start_volume) {
            return Err(Error::InvalidConfig(format!("startVolume must be within [0, 1], got {}", self.start_volume)));
        }
        Ok(())
    }

    /// Options from the node's `data-mejsoptions` attribute, if present
    pub fn from_node_attribute(doc: &Document, node: NodeId) -> Result<Option<Self>> {
        match doc.attr(node, OPTIONS_ATTRIBUTE) {
            Some(json) if !json.trim().is_empty() => Self::from_json(json).map(Some),
            _ => Ok(None),
        }
    }

    pub fn with_features<S: AsRef<str>>(mut self, features: &[S]) -> Self {
        self.features = features.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    /// Configured time format, or the one derived from the display options
    pub fn effective_time_format(&self) -> String {
        if self.time_format.is_empty() {
            derive_time_format(self.always_show_hours, self.show_timecode_frame_count)
        } else {
            self.time_format.clone()
        }
    }

    /// Prefixed class name
    pub fn class(&self, name: &str) -> String {
        format!("{}{}", self.class_prefix, name)
    }

    pub fn controls_timeout_default(&self) -> Duration {
        Duration::from_millis(self.controls_timeout_default)
    }

    pub fn controls_timeout_mouse_enter(&self) -> Duration {
        Duration::from_millis(self.controls_timeout_mouse_enter)
    }

    pub fn controls_timeout_mouse_leave(&self) -> Duration {
        Duration::from_millis(self.controls_timeout_mouse_leave)
    }

    /// True when the platform keeps its native controls
    pub fn uses_native_controls(&self) -> bool {
        (self.platform.ipad && self.ipad_use_native_controls)
            || (self.platform.iphone && self.iphone_use_native_controls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.default_video_width, 480.0);
        assert_eq!(config.controls_timeout_default(), Duration::from_millis(1500));
        assert_eq!(config.key_actions.len(), 7);
        assert_eq!(config.effective_time_format(), "mm:ss");
        assert_eq!(config.class("controls"), "mejs__controls");
    }

    #[test]
    fn test_from_json_merges_defaults() {
        let config = PlayerConfig::from_json(
            r#"{
                "videoWidth": "100%",
                "videoHeight": 360,
                "stretching": "responsive",
                "features": ["playpause"],
                "iPadUseNativeControls": true,
                "loop": true,
                "success": "onReady",
                "somethingElse": 1
            }"#,
        )
        .unwrap();
        assert_eq!(config.video_width, Some(Dimension::Percent(100.0)));
        assert_eq!(config.video_height, Some(Dimension::Px(360.0)));
        assert_eq!(config.stretching, StretchingMode::Responsive);
        assert_eq!(config.features, vec!["playpause"]);
        assert!(config.ipad_use_native_controls);
        assert!(config.loop_playback);
        assert!(matches!(config.success, Some(Callback::Named(ref n)) if n == "onReady"));
        assert_eq!(config.start_volume, 0.8);
    }

    #[test]
    fn test_from_json_rejects_unusable_options() {
        for json in [
            r#"{"framesPerSecond":0}"#,
            r#"{"defaultVideoWidth":-480}"#,
            r#"{"startVolume":1.5}"#,
        ] {
            assert!(matches!(PlayerConfig::from_json(json), Err(Error::InvalidConfig(_))), "{json}");
        }
        assert!(matches!(PlayerConfig::from_json("[1,2]"), Err(Error::Json(_))));
    }

    #[test]
    fn test_from_node_attribute() {
        let mut doc = Document::new();
        let video = doc.create_child(doc.body(), "video", "");
        assert!(PlayerConfig::from_node_attribute(&doc, video).unwrap().is_none());

        doc.set_attr(video, OPTIONS_ATTRIBUTE, r#"{"alwaysShowHours": true}"#);
        let config = PlayerConfig::from_node_attribute(&doc, video).unwrap().unwrap();
        assert_eq!(config.effective_time_format(), "hh:mm:ss");

        doc.set_attr(video, OPTIONS_ATTRIBUTE, "{not json");
        assert!(PlayerConfig::from_node_attribute(&doc, video).is_err());
    }

    #[test]
    fn test_seek_interval_resolve() {
        assert_eq!(SeekInterval::Seconds(3.0).resolve(100.0), 3.0);
        assert_eq!(SeekInterval::Fraction(0.05).resolve(f64::NAN), 0.0);
    }

    #[test]
    fn test_named_callback_lookup() {
        let table = CallbackTable::new();
        let hits = Rc::new(std::cell::Cell::new(0));
        let counter = hits.clone();
        table.register("onError", move |_| counter.set(counter.get() + 1));

        let error = MediaError::new(4, "unsupported");
        let args = CallbackArgs::Error {
            player: PlayerId(0),
            error: &error,
        };
        assert!(table.invoke(&Callback::Named("onError".into()), &args));
        assert!(!table.invoke(&Callback::Named("missing".into()), &args));
        assert_eq!(hits.get(), 1);
    }
}
