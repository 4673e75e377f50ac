//! Wrapped media element
//!
//! Playback itself belongs to the renderer. The chrome only drives it through
//! [`MediaElement`] and reacts to the [`MediaEvent`]s it queues. Calls never
//! deliver events re-entrantly: an implementation records what happened and
//! the event loop drains it with [`MediaElement::take_events`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::ReadyState;

/// Shared handle to a media element
pub type SharedMedia = Rc<dyn MediaElement>;

/// Media error details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaError {
    pub code: u16,
    pub message: String,
}

impl MediaError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media error {}: {}", self.code, self.message)
    }
}

/// Events a media element queues for the chrome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaEvent {
    /// The renderer has attached and the player may finish building
    RendererReady,
    Play,
    Playing,
    Pause,
    Ended,
    TimeUpdate,
    LoadedMetadata,
    Seeking,
    Seeked,
    Waiting,
    Error(MediaError),
    CanPlay,
    LoadedData,
    VolumeChange,
}

impl MediaEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MediaEvent::RendererReady => "rendererready",
            MediaEvent::Play => "play",
            MediaEvent::Playing => "playing",
            MediaEvent::Pause => "pause",
            MediaEvent::Ended => "ended",
            MediaEvent::TimeUpdate => "timeupdate",
            MediaEvent::LoadedMetadata => "loadedmetadata",
            MediaEvent::Seeking => "seeking",
            MediaEvent::Seeked => "seeked",
            MediaEvent::Waiting => "waiting",
            MediaEvent::Error(_) => "error",
            MediaEvent::CanPlay => "canplay",
            MediaEvent::LoadedData => "loadeddata",
            MediaEvent::VolumeChange => "volumechange",
        }
    }
}

/// The playback surface the chrome drives
pub trait MediaElement {
    /// Renderer name, e.g. `html5` or `youtube_iframe`
    fn renderer_name(&self) -> Option<String>;

    fn play(&self);
    fn pause(&self);
    fn load(&self);

    fn stop(&self) {
        self.pause();
    }

    fn paused(&self) -> bool;
    fn ended(&self) -> bool;
    fn ready_state(&self) -> ReadyState;

    fn current_time(&self) -> f64;
    fn set_current_time(&self, time: f64);

    /// Duration in seconds, `NaN` while unknown
    fn duration(&self) -> f64;

    fn volume(&self) -> f64;
    fn set_volume(&self, volume: f64);
    fn muted(&self) -> bool;
    fn set_muted(&self, muted: bool);

    /// Intrinsic video size, when known
    fn video_size(&self) -> Option<(f64, f64)>;

    /// Rendered size of the element
    fn offset_size(&self) -> (f64, f64) {
        (0.0, 0.0)
    }

    /// Resize the renderer. Returns false when the renderer can't be sized.
    fn set_size(&self, _width: f64, _height: f64) -> bool {
        false
    }

    fn src(&self) -> String;
    fn set_src(&self, src: &str);
    fn can_play_type(&self, mime: &str) -> bool;

    fn destroy(&self) {}

    /// Drain queued events
    fn take_events(&self) -> Vec<MediaEvent>;
}

const DEFAULT_PLAYABLE_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/ogg",
    "audio/mp4",
    "audio/mp3",
    "audio/mpeg",
    "audio/ogg",
    "audio/wav",
];

/// In-memory native media element.
///
/// Behaves like an HTML media element whose network and decoder are driven
/// by hand: call [`load_metadata`](Self::load_metadata), [`advance_to`](Self::advance_to),
/// [`finish`](Self::finish) or [`fail`](Self::fail) to simulate progress.
#[derive(Debug)]
pub struct SimulatedMedia {
    renderer: String,
    paused: Cell<bool>,
    ended: Cell<bool>,
    ready_state: Cell<ReadyState>,
    current_time: Cell<f64>,
    duration: Cell<f64>,
    volume: Cell<f64>,
    muted: Cell<bool>,
    video_size: Cell<Option<(f64, f64)>>,
    offset_size: Cell<(f64, f64)>,
    sizable: bool,
    last_size: Cell<Option<(f64, f64)>>,
    src: RefCell<String>,
    load_count: Cell<u32>,
    destroyed: Cell<bool>,
    playable: Vec<String>,
    events: RefCell<VecDeque<MediaEvent>>,
}

impl SimulatedMedia {
    /// Create a media element for `renderer`. The renderer-ready signal is
    /// queued immediately.
    pub fn new(renderer: impl Into<String>) -> Self {
        let media = Self {
            renderer: renderer.into(),
            paused: Cell::new(true),
            ended: Cell::new(false),
            ready_state: Cell::new(ReadyState::HaveNothing),
            current_time: Cell::new(0.0),
            duration: Cell::new(f64::NAN),
            volume: Cell::new(1.0),
            muted: Cell::new(false),
            video_size: Cell::new(None),
            offset_size: Cell::new((0.0, 0.0)),
            sizable: true,
            last_size: Cell::new(None),
            src: RefCell::new(String::new()),
            load_count: Cell::new(0),
            destroyed: Cell::new(false),
            playable: DEFAULT_PLAYABLE_TYPES.iter().map(|s| s.to_string()).collect(),
            events: RefCell::new(VecDeque::new()),
        };
        media.queue(MediaEvent::RendererReady);
        media
    }

    /// Native HTML5 renderer
    pub fn native() -> Self {
        Self::new("html5")
    }

    /// Renderer without `set_size` support
    pub fn unsizable(mut self) -> Self {
        self.sizable = false;
        self
    }

    pub fn with_src(self, src: &str) -> Self {
        *self.src.borrow_mut() = src.to_string();
        self
    }

    pub fn into_shared(self) -> Rc<Self> {
        Rc::new(self)
    }

    fn queue(&self, event: MediaEvent) {
        self.events.borrow_mut().push_back(event);
    }

    /// Metadata arrived: duration, intrinsic size, ready state 1
    pub fn load_metadata(&self, duration: f64, video_size: Option<(f64, f64)>) {
        self.duration.set(duration);
        self.video_size.set(video_size);
        if self.ready_state.get() < ReadyState::HaveMetadata {
            self.ready_state.set(ReadyState::HaveMetadata);
        }
        self.queue(MediaEvent::LoadedMetadata);
    }

    pub fn set_ready_state(&self, state: ReadyState) {
        self.ready_state.set(state);
        match state {
            ReadyState::HaveCurrentData => self.queue(MediaEvent::LoadedData),
            ReadyState::HaveFutureData | ReadyState::HaveEnoughData => self.queue(MediaEvent::CanPlay),
            _ => {}
        }
    }

    /// Playback progressed to `time`
    pub fn advance_to(&self, time: f64) {
        self.current_time.set(time.max(0.0));
        self.queue(MediaEvent::TimeUpdate);
    }

    /// Playback reached the end of the media
    pub fn finish(&self) {
        let duration = self.duration.get();
        if duration.is_finite() {
            self.current_time.set(duration);
        }
        self.ended.set(true);
        if !self.paused.replace(true) {
            self.queue(MediaEvent::Pause);
        }
        self.queue(MediaEvent::Ended);
    }

    pub fn fail(&self, error: MediaError) {
        self.queue(MediaEvent::Error(error));
    }

    pub fn set_offset_size(&self, width: f64, height: f64) {
        self.offset_size.set((width, height));
    }

    pub fn load_count(&self) -> u32 {
        self.load_count.get()
    }

    pub fn last_size(&self) -> Option<(f64, f64)> {
        self.last_size.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn pending_events(&self) -> usize {
        self.events.borrow().len()
    }
}

impl MediaElement for SimulatedMedia {
    fn renderer_name(&self) -> Option<String> {
        Some(self.renderer.clone())
    }

    fn play(&self) {
        if self.ended.get() {
            self.ended.set(false);
            self.current_time.set(0.0);
        }
        if self.paused.replace(false) {
            self.queue(MediaEvent::Play);
        }
        self.queue(MediaEvent::Playing);
    }

    fn pause(&self) {
        if !self.paused.replace(true) {
            self.queue(MediaEvent::Pause);
        }
    }

    fn load(&self) {
        self.load_count.set(self.load_count.get() + 1);
    }

    fn paused(&self) -> bool {
        self.paused.get()
    }

    fn ended(&self) -> bool {
        self.ended.get()
    }

    fn ready_state(&self) -> ReadyState {
        self.ready_state.get()
    }

    fn current_time(&self) -> f64 {
        self.current_time.get()
    }

    fn set_current_time(&self, time: f64) {
        let mut time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        let duration = self.duration.get();
        if duration.is_finite() {
            time = time.min(duration);
        }
        self.current_time.set(time);
        if time < duration {
            self.ended.set(false);
        }
        self.queue(MediaEvent::Seeking);
        self.queue(MediaEvent::Seeked);
        self.queue(MediaEvent::TimeUpdate);
    }

    fn duration(&self) -> f64 {
        self.duration.get()
    }

    fn volume(&self) -> f64 {
        self.volume.get()
    }

    fn set_volume(&self, volume: f64) {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        self.volume.set(volume);
        self.queue(MediaEvent::VolumeChange);
    }

    fn muted(&self) -> bool {
        self.muted.get()
    }

    fn set_muted(&self, muted: bool) {
        if self.muted.replace(muted) != muted {
            self.queue(MediaEvent::VolumeChange);
        }
    }

    fn video_size(&self) -> Option<(f64, f64)> {
        self.video_size.get()
    }

    fn offset_size(&self) -> (f64, f64) {
        self.offset_size.get()
    }

    fn set_size(&self, width: f64, height: f64) -> bool {
        if !self.sizable {
            return false;
        }
        self.last_size.set(Some((width, height)));
        self.offset_size.set((width, height));
        true
    }

    fn src(&self) -> String {
        self.src.borrow().clone()
    }

    fn set_src(&self, src: &str) {
        *self.src.borrow_mut() = src.to_string();
        self.ready_state.set(ReadyState::HaveNothing);
        self.ended.set(false);
        self.current_time.set(0.0);
        self.duration.set(f64::NAN);
    }

    fn can_play_type(&self, mime: &str) -> bool {
        let base = mime.split(';').next().unwrap_or(mime).trim();
        self.playable.iter().any(|t| t.eq_ignore_ascii_case(base))
    }

    fn destroy(&self) {
        self.destroyed.set(true);
        self.events.borrow_mut().clear();
    }

    fn take_events(&self) -> Vec<MediaEvent> {
        self.events.borrow_mut().drain(..).collect()
    }
}

/// MIME type implied by a source URL's file extension.
///
/// Relative sources are resolved against a placeholder base so only the path
/// matters.
pub fn media_type_from_src(src: &str) -> Option<&'static str> {
    let parsed = Url::parse(src).or_else(|_| {
        Url::parse("http://localhost/").and_then(|base| base.join(src))
    });
    let url = parsed.ok()?;
    let path = url.path();
    let extension = path.rsplit_once('.')?.1.to_ascii_lowercase();

    let mime = match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "ogv" | "ogg" => "video/ogg",
        "mov" => "video/quicktime",
        "flv" => "video/flv",
        "m3u8" => "application/x-mpegURL",
        "mpd" => "application/dash+xml",
        "mp3" => "audio/mp3",
        "m4a" => "audio/mp4",
        "oga" => "audio/ogg",
        "wav" => "audio/wav",
        _ => return None,
    };
    Some(mime)
}
