//! Player facade
//!
//! A [`Player`] wraps one media node: it builds the container, layers and
//! control bar around it, mounts features once the renderer reports ready,
//! and reacts to DOM and media events. All sizing and visibility decisions
//! are delegated to [`crate::geometry`] and [`crate::visibility`].

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::command::{CommandQueue, PlayerCommand};
use crate::config::{CallbackArgs, CallbackTable, PlayerConfig};
use crate::dom::{Document, DomEvent, DomEventKind, EventTarget, ListenerId, NodeId, SharedDocument};
use crate::features::{self, apply_poster, ChromeNodes, FeatureHost, FeatureRegistry, MountedFeature, PlayerView};
use crate::geometry::{self, FillLayout, ResponsiveInput, Size, SizingPlan};
use crate::keyboard::{self, KeyContext};
use crate::media::{media_type_from_src, MediaError, MediaEvent, SharedMedia};
use crate::registry::{PlayerRegistry, RegistryEntry};
use crate::timefmt::calculate_time_format;
use crate::timer::{ManualClock, SharedClock, TimerId, TimerQueue, TokioClock};
use crate::types::{ControlsEvent, Dimension, PlayerEvent, PlayerId, PlayerState, StretchingMode};
use crate::visibility::{ControlsVisibility, HideGuard, Visibility, FADE_DURATION};
use crate::{Error, Result};

/// Capacity of the notification channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

const FOCUS_OUT_DEBOUNCE: Duration = Duration::from_millis(100);
const RESET_SIZE_DELAY: Duration = Duration::from_millis(50);
const REWIND_OVERLAY_DELAY: Duration = Duration::from_millis(20);

/// Listeners the player itself registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChromeHandler {
    ContainerFocus,
    MouseEnter,
    MouseMove,
    MouseLeave,
    MediaClick,
    TouchStart,
    FocusOut,
    WindowResize,
    DocumentClick,
    DocumentKeyDown,
    IframeOverlayClick,
}

/// Where a listener's events go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    Chrome(ChromeHandler),
    Feature(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    HideControls,
    FadeComplete,
    FocusOutCheck,
    ResetSize,
    HideLoadingOverlay,
}

#[derive(Debug)]
enum DeferredCallback {
    Success,
    Error(MediaError),
}

/// Host environment shared by every player on a page
#[derive(Debug, Clone)]
pub struct PlayerContext {
    pub document: SharedDocument,
    pub registry: PlayerRegistry,
    pub clock: SharedClock,
    pub callbacks: Rc<CallbackTable>,
    pub features: Rc<FeatureRegistry>,
}

impl PlayerContext {
    /// Fresh document, empty registry and the built-in features
    pub fn new(clock: SharedClock) -> Self {
        Self {
            document: Document::new().into_shared(),
            registry: PlayerRegistry::new(),
            clock,
            callbacks: Rc::new(CallbackTable::new()),
            features: Rc::new(FeatureRegistry::with_builtins()),
        }
    }

    /// Context driven by tokio's clock
    pub fn tokio() -> Self {
        Self::new(Rc::new(TokioClock))
    }

    /// Context driven by a [`ManualClock`], returned alongside it
    pub fn manual() -> (Self, Rc<ManualClock>) {
        let clock = Rc::new(ManualClock::new());
        (Self::new(clock.clone()), clock)
    }
}

/// A media node wrapped with player chrome
pub struct Player {
    id: PlayerId,
    ctx: PlayerContext,
    config: PlayerConfig,
    node: NodeId,
    media: SharedMedia,
    chrome: Option<ChromeNodes>,
    outer_container: Option<NodeId>,
    fill_wrapper: Option<NodeId>,
    is_dynamic: bool,
    is_video: bool,
    native_controls: bool,
    width: Dimension,
    height: Dimension,
    initial_aspect_ratio: f64,
    visibility: ControlsVisibility,
    timers: TimerQueue<TimerKind>,
    focus_out_timer: Option<TimerId>,
    focus: Rc<Cell<bool>>,
    keyboard_action: bool,
    is_loaded: bool,
    created: bool,
    is_fullscreen: bool,
    fullscreen_available: bool,
    rail: Option<(NodeId, NodeId)>,
    volume_slider: Option<NodeId>,
    base_time_format: String,
    time_format: String,
    last_duration: f64,
    features: Vec<MountedFeature>,
    feature_positions: HashMap<String, usize>,
    routes: HashMap<ListenerId, Route>,
    state: PlayerState,
    state_tx: watch::Sender<PlayerState>,
    events_tx: broadcast::Sender<PlayerEvent>,
    deferred: Vec<DeferredCallback>,
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("node", &self.node)
            .field("chrome", &self.chrome)
            .field("visibility", &self.visibility.state())
            .field("features", &self.features)
            .finish()
    }
}

fn same_duration(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn px_style(doc: &Document, node: NodeId, property: &str) -> f64 {
    doc.style(node, property)
        .and_then(Dimension::from_css)
        .and_then(|d| d.as_px())
        .unwrap_or(0.0)
}

impl Player {
    /// Wrap `node` with player chrome.
    ///
    /// When `config` is `None` the options come from the node's
    /// `data-mejsoptions` attribute, falling back to the defaults.
    #[instrument(skip_all, fields(node = ?node))]
    pub fn new(ctx: PlayerContext, node: NodeId, media: SharedMedia, config: Option<PlayerConfig>) -> Result<Self> {
        let document = Rc::clone(&ctx.document);
        let mut doc = document.borrow_mut();

        if let Some(existing) = doc.node_player(node) {
            return Err(Error::AlreadyWrapped(existing));
        }
        if !doc.is_attached(node) {
            return Err(Error::DetachedNode);
        }
        let config = match config {
            Some(config) => config,
            None => PlayerConfig::from_node_attribute(&doc, node)?.unwrap_or_default(),
        };

        let tag = doc.tag(node).to_string();
        let is_dynamic = tag != "audio" && tag != "video";
        let is_video = if is_dynamic { config.is_video } else { tag == "video" };

        let id = ctx.registry.allocate_id();
        let focus = Rc::new(Cell::new(false));
        ctx.registry.insert(
            id,
            RegistryEntry {
                media: Rc::clone(&media),
                focus: Rc::clone(&focus),
                pause_other_players: config.pause_other_players,
                container: None,
            },
        );

        let base_time_format = config.effective_time_format();
        let (state_tx, _) = watch::channel(PlayerState::Constructed);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let timers = TimerQueue::new(Rc::clone(&ctx.clock));

        let mut player = Self {
            id,
            ctx,
            config,
            node,
            media,
            chrome: None,
            outer_container: None,
            fill_wrapper: None,
            is_dynamic,
            is_video,
            native_controls: false,
            width: Dimension::Auto,
            height: Dimension::Auto,
            initial_aspect_ratio: f64::NAN,
            visibility: ControlsVisibility::new(),
            timers,
            focus_out_timer: None,
            focus,
            keyboard_action: false,
            is_loaded: false,
            created: false,
            is_fullscreen: false,
            fullscreen_available: false,
            rail: None,
            volume_slider: None,
            time_format: calculate_time_format(0.0, &base_time_format),
            base_time_format,
            last_duration: f64::NAN,
            features: Vec::new(),
            feature_positions: HashMap::new(),
            routes: HashMap::new(),
            state: PlayerState::Constructed,
            state_tx,
            events_tx,
            deferred: Vec::new(),
        };

        doc.set_node_player(node, Some(id));
        if let Err(e) = player.build(&mut *doc) {
            doc.set_node_player(node, None);
            doc.remove_listeners_for(id);
            player.ctx.registry.remove(id);
            return Err(e);
        }
        drop(doc);

        player.set_state(PlayerState::AwaitingMedia);
        info!(player = %id, video = is_video, chrome = player.chrome.is_some(), "Player created");
        Ok(player)
    }

    fn class(&self, name: &str) -> String {
        self.config.class(name)
    }

    fn build(&mut self, doc: &mut Document) -> Result<()> {
        let platform = self.config.platform;

        if self.config.uses_native_controls() {
            doc.set_attr(self.node, "controls", "true");
            self.native_controls = true;
            if platform.ipad && doc.has_attr(self.node, "autoplay") {
                self.play();
            }
            return Ok(());
        }

        let android_native = platform.android && self.config.android_use_native_controls;
        if (self.is_video || !self.config.features.is_empty()) && !android_native {
            return self.build_chrome(doc);
        }

        self.native_controls = android_native;
        if !self.is_video && self.config.features.is_empty() {
            doc.set_display(self.node, false);
        }
        Ok(())
    }

    fn build_chrome(&mut self, doc: &mut Document) -> Result<()> {
        let node = self.node;
        doc.remove_attr(node, "controls");

        let offscreen = doc.create_element("span");
        doc.add_class(offscreen, &self.class("offscreen"));
        doc.set_text(offscreen, if self.is_video { "Video Player" } else { "Audio Player" });

        let container = doc.create_element("div");
        let container_class = format!(
            "{} {} {}",
            self.class("container"),
            self.class("container-keyboard-inactive"),
            doc.class_name(node)
        );
        doc.add_class(container, &container_class);
        doc.add_class(container, &self.class(if self.is_video { "video" } else { "audio" }));
        let platform = self.config.platform;
        for (flag, name) in [(platform.android, "android"), (platform.ios, "ios"), (platform.ipad, "ipad"), (platform.iphone, "iphone")] {
            if flag {
                doc.add_class(container, &self.class(name));
            }
        }
        doc.set_attr(container, "id", self.id.to_string());
        doc.set_attr(container, "tabindex", "0");
        doc.set_attr(container, "role", "application");
        doc.set_attr(container, "aria-label", if self.is_video { "Video Player" } else { "Audio Player" });

        let inner = doc.create_child(container, "div", &self.class("inner"));
        let media_wrapper = doc.create_child(inner, "div", &self.class("mediaelement"));
        let layers = doc.create_child(inner, "div", &self.class("layers"));
        let controls = doc.create_child(inner, "div", &self.class("controls"));
        doc.create_child(inner, "div", &self.class("clear"));

        self.outer_container = doc.parent(node);
        doc.insert_before(offscreen, node)?;
        doc.insert_before(container, node)?;
        doc.append_child(media_wrapper, node);

        let fill_class = self.class("fill-container");
        let outer_is_fill = self.outer_container.is_some_and(|o| doc.has_class(o, &fill_class));
        if self.is_video && self.config.stretching == StretchingMode::Fill && !outer_is_fill {
            let wrapper = doc.create_element("div");
            doc.add_class(wrapper, &fill_class);
            doc.insert_before(wrapper, container)?;
            doc.append_child(wrapper, container);
            self.fill_wrapper = Some(wrapper);
        }

        let nodes = ChromeNodes {
            media_node: node,
            container,
            inner,
            media_wrapper,
            layers,
            controls,
            offscreen,
        };
        self.chrome = Some(nodes);
        self.ctx.registry.set_container(self.id, container);

        let (forced_w, forced_h, default_w, default_h) = if self.is_video {
            (
                self.config.video_width,
                self.config.video_height,
                self.config.default_video_width,
                self.config.default_video_height,
            )
        } else {
            (
                self.config.audio_width,
                self.config.audio_height,
                self.config.default_audio_width,
                self.config.default_audio_height,
            )
        };
        let style = |prop: &str| doc.style(node, prop).and_then(Dimension::from_css);
        let attr = |name: &str| doc.attr(node, name).and_then(Dimension::from_css);
        self.width = geometry::initial_dimension(forced_w, style("width"), attr("width"), default_w);
        self.height = geometry::initial_dimension(forced_h, style("height"), attr("height"), default_h);
        self.initial_aspect_ratio = geometry::orientation_ratio(
            self.width.as_px().unwrap_or(f64::NAN),
            self.height.as_px().unwrap_or(f64::NAN),
        );

        self.set_player_size_with(doc, None, None);
        self.listen(doc, EventTarget::Node(container), DomEventKind::Focus, ChromeHandler::ContainerFocus);

        if !self.config.features.is_empty() && !self.config.hide_video_controls_on_load {
            self.emit(ControlsEvent::Shown);
        }
        Ok(())
    }

    fn listen(&mut self, doc: &mut Document, target: EventTarget, kind: DomEventKind, handler: ChromeHandler) {
        let id = doc.add_listener(target, kind, self.id);
        self.routes.insert(id, Route::Chrome(handler));
    }

    fn view(&self) -> PlayerView {
        PlayerView {
            is_video: self.is_video,
            time_format: self.time_format.clone(),
            frames_per_second: self.config.frames_per_second,
            is_fullscreen: self.is_fullscreen,
            controls_visible: self.visibility.is_visible(),
        }
    }

    fn run_features<R>(
        &mut self,
        doc: &mut Document,
        f: impl FnOnce(&mut [MountedFeature], &mut FeatureHost<'_>) -> R,
    ) -> Option<R> {
        let nodes = self.chrome?;
        let view = self.view();
        let mut commands = CommandQueue::new();
        let result = {
            let mut host = FeatureHost {
                player: self.id,
                doc: &mut *doc,
                nodes,
                media: &*self.media,
                config: &self.config,
                view: &view,
                positions: &mut self.feature_positions,
                routes: &mut self.routes,
                commands: &mut commands,
            };
            f(&mut self.features, &mut host)
        };
        self.apply_commands(doc, commands.drain());
        Some(result)
    }

    fn emit(&self, kind: ControlsEvent) {
        let Some(nodes) = self.chrome else { return };
        debug!(player = %self.id, event = kind.event_name(), "Dispatching notification");
        let _ = self.events_tx.send(PlayerEvent {
            player: self.id,
            container: nodes.container,
            kind,
        });
    }

    fn set_state(&mut self, next: PlayerState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            debug!(player = %self.id, from = %self.state, to = %next, "Ignoring state transition");
            return;
        }
        debug!(player = %self.id, from = %self.state, to = %next, "State transition");
        self.state = next;
        self.state_tx.send_replace(next);
    }

    fn flush_callbacks(&mut self) {
        for callback in std::mem::take(&mut self.deferred) {
            match callback {
                DeferredCallback::Success => {
                    if let Some(cb) = &self.config.success {
                        let args = CallbackArgs::Success {
                            player: self.id,
                            node: self.node,
                            media: &*self.media,
                        };
                        self.ctx.callbacks.invoke(cb, &args);
                    }
                }
                DeferredCallback::Error(error) => {
                    if let Some(cb) = &self.config.error {
                        let args = CallbackArgs::Error {
                            player: self.id,
                            error: &error,
                        };
                        self.ctx.callbacks.invoke(cb, &args);
                    }
                }
            }
        }
    }

    // Lifecycle

    #[instrument(skip(self), fields(player = %self.id))]
    fn me_ready(&mut self) {
        if self.created {
            debug!("Renderer ready again, ignoring");
            return;
        }
        self.created = true;

        let document = Rc::clone(&self.ctx.document);
        {
            let mut doc = document.borrow_mut();
            let autoplay = doc.attr(self.node, "autoplay").is_some_and(|v| v != "false");
            if self.chrome.is_some() {
                self.wire_chrome(&mut *doc, autoplay);
            }
            self.set_state(PlayerState::Ready);

            let native_renderer = self
                .media
                .renderer_name()
                .is_some_and(|r| r.contains("native") || r.contains("html5"));
            if autoplay && native_renderer {
                self.play();
            }
        }

        self.deferred.push(DeferredCallback::Success);
        info!(features = self.features.iter().filter(|f| f.built).count(), "Player ready");
    }

    fn wire_chrome(&mut self, doc: &mut Document, autoplay: bool) {
        let Some(nodes) = self.chrome else { return };

        self.features = features::mount(&self.ctx.features, self.id, &self.config.features);
        let failed = self
            .run_features(doc, |mounted, host| features::build_all(mounted, host))
            .unwrap_or(0);
        if failed > 0 {
            warn!(failed, "Some features failed to build");
        }
        self.emit(ControlsEvent::Ready);

        if self.is_video {
            if self.config.platform.is_touch() && !self.config.always_show_controls {
                self.listen(doc, EventTarget::Node(self.node), DomEventKind::TouchStart, ChromeHandler::TouchStart);
            } else {
                self.create_iframe_layer(doc);
                self.listen(doc, EventTarget::Node(self.node), DomEventKind::Click, ChromeHandler::MediaClick);
                let container = EventTarget::Node(nodes.container);
                self.listen(doc, container, DomEventKind::MouseEnter, ChromeHandler::MouseEnter);
                self.listen(doc, container, DomEventKind::MouseMove, ChromeHandler::MouseMove);
                self.listen(doc, container, DomEventKind::MouseLeave, ChromeHandler::MouseLeave);
            }
            if self.config.hide_video_controls_on_load {
                self.hide_controls_with(doc, false, false);
            }
            if autoplay && !self.config.always_show_controls {
                self.hide_controls_with(doc, true, false);
            }
        }

        self.listen(doc, EventTarget::Node(nodes.container), DomEventKind::FocusOut, ChromeHandler::FocusOut);
        self.set_player_size_with(doc, None, None);
        self.set_controls_size_with(doc);

        self.listen(doc, EventTarget::Window, DomEventKind::Resize, ChromeHandler::WindowResize);
        self.listen(doc, EventTarget::Document, DomEventKind::Click, ChromeHandler::DocumentClick);
        self.listen(doc, EventTarget::Document, DomEventKind::KeyDown, ChromeHandler::DocumentKeyDown);
    }

    /// Tear the player down and return the restored media node.
    ///
    /// Stops playback, cleans every feature, puts the native element back
    /// where the container was, and releases all listeners and timers.
    #[instrument(skip(self), fields(player = %self.id))]
    pub fn remove(&mut self) -> Result<NodeId> {
        if self.state == PlayerState::Removed {
            return Err(Error::PlayerRemoved(self.id));
        }
        let document = Rc::clone(&self.ctx.document);
        let mut doc = document.borrow_mut();
        let node = self.node;
        let renderer = self.media.renderer_name().unwrap_or_default();

        if !self.media.paused() {
            self.media.pause();
        }
        let src = doc
            .attr(node, "src")
            .map(str::to_string)
            .unwrap_or_else(|| self.media.src());
        let playable = media_type_from_src(&src).is_some_and(|mime| self.media.can_play_type(mime));
        self.media.set_src("");

        let failed = self
            .run_features(&mut *doc, |mounted, host| features::clean_all(mounted, host))
            .unwrap_or(0);
        if failed > 0 {
            warn!(failed, "Some features failed to clean up");
        }

        for (attribute, property) in [("width", "width"), ("height", "height")] {
            match doc.attr(node, attribute).and_then(Dimension::from_css) {
                Some(d) => doc.set_style(node, property, d.to_css()),
                None => doc.remove_style(node, property),
            }
        }

        let mut restored = node;
        let mut restore = Ok(());
        if let Some(nodes) = self.chrome {
            self.remove_iframe_layer(&mut *doc);
            let anchor = self.fill_wrapper.unwrap_or(nodes.container);
            if self.is_dynamic {
                restore = self.restore_node(&mut *doc, node, anchor);
            } else {
                doc.set_attr(node, "controls", "true");
                if let Some(id) = doc.attr(node, "id").map(str::to_string) {
                    let stripped = id.replace(&format!("_{}", renderer), "").replace("_from_mejs", "");
                    doc.set_attr(node, "id", stripped);
                }
                doc.remove_attr(node, "autoplay");
                if playable && !src.is_empty() {
                    doc.set_attr(node, "src", src.as_str());
                }
                restored = doc.clone_node(node, true);
                restore = self.restore_node(&mut *doc, restored, anchor);
                doc.detach(node);
            }
            doc.detach(nodes.offscreen);
            doc.detach(anchor);
        }

        self.media.destroy();
        self.ctx.registry.remove(self.id);
        let listeners = doc.remove_listeners_for(self.id);
        self.routes.clear();
        let timers = self.timers.clear();
        self.visibility.take_hide_timer();
        self.visibility.take_fade_timer();
        self.focus_out_timer = None;
        doc.set_node_player(node, None);
        drop(doc);

        self.set_state(PlayerState::Removed);
        info!(listeners, timers, "Player removed");
        restore.map(|()| restored)
    }

    /// Put `node` where the chrome was; a detached chrome restores into the body
    fn restore_node(&self, doc: &mut Document, node: NodeId, anchor: NodeId) -> Result<()> {
        if doc.parent(anchor).is_some() {
            return doc.insert_before(node, anchor);
        }
        warn!(player = %self.id, "Chrome detached before removal, restoring media into body");
        let body = doc.body();
        doc.append_child(body, node);
        Ok(())
    }

    // Event entry points

    /// Deliver a media event
    pub fn handle_media_event(&mut self, event: MediaEvent) {
        if self.state == PlayerState::Removed {
            return;
        }
        if event == MediaEvent::RendererReady {
            self.me_ready();
        } else {
            let document = Rc::clone(&self.ctx.document);
            let mut doc = document.borrow_mut();
            self.on_media_event(&mut *doc, &event);
        }
        self.flush_callbacks();
    }

    /// Deliver a DOM event reaching one of this player's listeners
    pub fn handle_dom_event(&mut self, listener: ListenerId, event: &DomEvent) {
        if self.state == PlayerState::Removed {
            return;
        }
        let Some(route) = self.routes.get(&listener).copied() else {
            return;
        };
        {
            let document = Rc::clone(&self.ctx.document);
            let mut doc = document.borrow_mut();
            match route {
                Route::Feature(index) => {
                    self.run_features(&mut *doc, |mounted, host| {
                        features::dom_event(mounted, host, index, listener, event)
                    });
                }
                Route::Chrome(handler) => self.on_chrome_event(&mut *doc, handler, event),
            }
        }
        self.flush_callbacks();
    }

    /// Fire every timer whose deadline has passed. Returns how many fired.
    pub fn fire_due_timers(&mut self) -> usize {
        if self.state == PlayerState::Removed {
            return 0;
        }
        let due = self.timers.take_due();
        if due.is_empty() {
            return 0;
        }
        {
            let document = Rc::clone(&self.ctx.document);
            let mut doc = document.borrow_mut();
            for (id, kind) in &due {
                self.on_timer(&mut *doc, *id, *kind);
            }
        }
        self.flush_callbacks();
        due.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    fn on_timer(&mut self, doc: &mut Document, id: TimerId, kind: TimerKind) {
        debug!(player = %self.id, timer = ?kind, "Timer fired");
        match kind {
            TimerKind::HideControls => {
                if self.visibility.hide_timer() == Some(id) {
                    self.visibility.take_hide_timer();
                }
                self.hide_controls_with(doc, true, false);
            }
            TimerKind::FadeComplete => self.finish_fade(doc),
            TimerKind::FocusOutCheck => {
                self.focus_out_timer = None;
                let Some(nodes) = self.chrome else { return };
                let inside = doc.active_element().is_some_and(|a| doc.contains(nodes.container, a));
                if self.keyboard_action && !inside {
                    self.keyboard_action = false;
                    if self.is_video && !self.config.always_show_controls && !self.media.paused() {
                        self.start_controls_timer(Some(self.config.controls_timeout_mouse_leave()));
                    }
                }
            }
            TimerKind::ResetSize => {
                self.set_player_size_with(doc, None, None);
                self.set_controls_size_with(doc);
            }
            TimerKind::HideLoadingOverlay => {
                let Some(nodes) = self.chrome else { return };
                let loading = doc.find_by_class(nodes.container, &self.class("overlay-loading"));
                if let Some(layer) = loading.and_then(|l| doc.parent(l)) {
                    doc.set_display(layer, false);
                }
            }
        }
    }

    fn on_media_event(&mut self, doc: &mut Document, event: &MediaEvent) {
        match event {
            MediaEvent::Play | MediaEvent::Playing => self.set_state(PlayerState::Playing),
            MediaEvent::Pause => self.set_state(PlayerState::Paused),
            _ => {}
        }

        if let MediaEvent::Error(error) = event {
            self.run_features(doc, |mounted, host| features::media_event(mounted, host, event));
            self.handle_error_with(doc, error.clone());
            return;
        }
        if !self.created {
            return;
        }
        self.run_features(doc, |mounted, host| features::media_event(mounted, host, event));
        if self.chrome.is_none() {
            return;
        }

        match event {
            MediaEvent::Play => {
                self.focus.set(true);
                let paused = self.ctx.registry.pause_others(self.id);
                if !paused.is_empty() {
                    debug!(player = %self.id, paused = paused.len(), "Paused other players");
                }
            }
            MediaEvent::Ended => self.on_ended(doc),
            MediaEvent::LoadedMetadata => self.on_loaded_metadata(doc),
            MediaEvent::TimeUpdate => {
                let duration = self.media.duration();
                if !same_duration(duration, self.last_duration) {
                    self.last_duration = duration;
                    self.time_format = calculate_time_format(duration, &self.base_time_format);
                    self.set_controls_size_with(doc);
                }
            }
            _ => {}
        }
    }

    fn on_ended(&mut self, doc: &mut Document) {
        if self.config.auto_rewind {
            self.media.set_current_time(0.0);
            self.timers.schedule(REWIND_OVERLAY_DELAY, TimerKind::HideLoadingOverlay);
        }
        self.media.stop();

        if self.config.loop_playback {
            self.play();
        } else if !self.config.always_show_controls && self.visibility.is_enabled() {
            self.show_controls_with(doc, true);
        }
    }

    fn on_loaded_metadata(&mut self, doc: &mut Document) {
        let duration = self.media.duration();
        self.last_duration = duration;
        self.time_format = calculate_time_format(duration, &self.base_time_format);

        if !self.is_fullscreen {
            self.set_player_size_with(doc, None, None);
            self.set_controls_size_with(doc);
        }

        let forced_height = self.config.video_height.is_some_and(|h| h.is_forced()) || doc.has_attr(self.node, "height");
        if self.is_video && self.config.enable_autosize && !forced_height {
            if let Some((w, h)) = self.media.video_size().filter(|(w, h)| *w > 0.0 && *h > 0.0) {
                self.set_player_size_with(doc, Some(Dimension::Px(w)), Some(Dimension::Px(h)));
                self.set_controls_size_with(doc);
                self.media.set_size(w, h);
            }
        }
    }

    fn handle_error_with(&mut self, doc: &mut Document, error: MediaError) {
        warn!(player = %self.id, code = error.code, message = %error.message, "Media error");
        if self.chrome.is_some() {
            self.disable_controls_with(doc);
        }
        self.deferred.push(DeferredCallback::Error(error));
    }

    fn on_chrome_event(&mut self, doc: &mut Document, handler: ChromeHandler, event: &DomEvent) {
        let Some(nodes) = self.chrome else { return };
        let always_show = self.config.always_show_controls;
        let enabled = self.visibility.is_enabled();

        match handler {
            ChromeHandler::ContainerFocus => {
                if !self.visibility.is_visible() && !self.focus.get() && enabled {
                    self.show_controls_with(doc, true);
                    let target = match event.related_target {
                        Some(related) if doc.is_node_after(related, nodes.container) => {
                            doc.find_all_by_class(nodes.controls, &self.class("button")).last().copied()
                        }
                        _ => doc.find_by_class(nodes.controls, &self.class("playpause-button")),
                    };
                    if let Some(button) = target.and_then(|t| doc.children(t).first().copied()) {
                        doc.focus(button);
                    }
                }
            }
            ChromeHandler::MouseEnter => {
                if enabled && !always_show {
                    self.kill_controls_timer();
                    self.show_controls_with(doc, true);
                    self.start_controls_timer(Some(self.config.controls_timeout_mouse_enter()));
                }
            }
            ChromeHandler::MouseMove => {
                if enabled {
                    if !self.visibility.is_visible() {
                        self.show_controls_with(doc, true);
                    }
                    if !always_show {
                        self.start_controls_timer(Some(self.config.controls_timeout_mouse_enter()));
                    }
                }
            }
            ChromeHandler::MouseLeave => {
                if enabled && !self.media.paused() && !always_show {
                    self.start_controls_timer(Some(self.config.controls_timeout_mouse_leave()));
                }
            }
            ChromeHandler::MediaClick | ChromeHandler::IframeOverlayClick => {
                if self.config.click_to_play_pause {
                    self.toggle_playback();
                }
            }
            ChromeHandler::TouchStart => {
                if self.visibility.is_visible() {
                    self.hide_controls_with(doc, false, false);
                } else if enabled {
                    self.show_controls_with(doc, false);
                }
            }
            ChromeHandler::FocusOut => {
                if let Some(previous) = self.focus_out_timer.take() {
                    self.timers.cancel(previous);
                }
                self.focus_out_timer = Some(self.timers.schedule(FOCUS_OUT_DEBOUNCE, TimerKind::FocusOutCheck));
            }
            ChromeHandler::WindowResize => {
                if !self.is_fullscreen {
                    self.set_player_size_with(doc, None, None);
                }
                self.set_controls_size_with(doc);
            }
            ChromeHandler::DocumentClick | ChromeHandler::DocumentKeyDown => {
                let inside = event.target_node().is_some_and(|t| doc.contains(nodes.container, t));
                let inactive = self.class("container-keyboard-inactive");
                match handler {
                    ChromeHandler::DocumentClick if inside => doc.add_class(nodes.container, &inactive),
                    ChromeHandler::DocumentKeyDown if inside => doc.remove_class(nodes.container, &inactive),
                    _ => {}
                }
            }
        }
    }

    fn apply_commands(&mut self, doc: &mut Document, commands: Vec<PlayerCommand>) {
        for command in commands {
            match command {
                PlayerCommand::Play => self.play(),
                PlayerCommand::Pause => self.pause(),
                PlayerCommand::TogglePlayback => self.toggle_playback(),
                PlayerCommand::SeekTo(time) => self.media.set_current_time(time),
                PlayerCommand::ToggleMute => self.media.set_muted(!self.media.muted()),
                PlayerCommand::ShowControls { animate } => self.show_controls_with(doc, animate),
                PlayerCommand::HideControls { animate } => self.hide_controls_with(doc, animate, false),
                PlayerCommand::StartControlsTimer(timeout) => self.start_controls_timer(timeout),
                PlayerCommand::KillControlsTimer => self.kill_controls_timer(),
                PlayerCommand::SetFocus(focus) => self.focus.set(focus),
                PlayerCommand::SetKeyboardAction(active) => self.keyboard_action = active,
                PlayerCommand::KeyDown(event) => self.run_key_action(doc, &event),
                PlayerCommand::HandleError(error) => self.handle_error_with(doc, error),
                PlayerCommand::ToggleFullscreen => {
                    if self.is_fullscreen {
                        self.exit_fullscreen_with(doc);
                    } else {
                        self.enter_fullscreen_with(doc);
                    }
                }
                PlayerCommand::EnterFullscreen => self.enter_fullscreen_with(doc),
                PlayerCommand::ExitFullscreen => self.exit_fullscreen_with(doc),
                PlayerCommand::RegisterFullscreen => self.fullscreen_available = true,
                PlayerCommand::RegisterRail { rail, total } => self.rail = Some((rail, total)),
                PlayerCommand::ClearRail => self.rail = None,
                PlayerCommand::RegisterVolumeSlider(slider) => self.volume_slider = Some(slider),
                PlayerCommand::RevealVolumeSlider { only_if_focused } => {
                    self.reveal_volume_slider(doc, only_if_focused)
                }
                PlayerCommand::SetControlsSize => self.set_controls_size_with(doc),
            }
        }
    }

    fn run_key_action(&mut self, doc: &mut Document, event: &DomEvent) {
        if !self.focus.get() || !self.config.enable_keyboard {
            return;
        }
        let Some(code) = event.key_code else { return };
        let Some(action) = keyboard::find_action(&self.config.key_actions, code).map(|a| a.action.clone()) else {
            return;
        };

        let mut ctx = KeyContext::new(self.id, &*self.media, event, code);
        ctx.is_video = self.is_video;
        ctx.is_fullscreen = self.is_fullscreen;
        ctx.fullscreen_available = self.fullscreen_available;
        ctx.seek_backward = self.config.default_seek_backward_interval;
        ctx.seek_forward = self.config.default_seek_forward_interval;
        action.execute(&mut ctx);
        let commands = ctx.into_commands();

        debug!(player = %self.id, key = code, action = action.name(), "Key action");
        self.apply_commands(doc, commands);
    }

    fn reveal_volume_slider(&mut self, doc: &mut Document, only_if_focused: bool) {
        let Some(slider) = self.volume_slider else { return };
        if only_if_focused {
            let button = self.class("volume-button");
            let focused = doc
                .active_element()
                .and_then(|a| doc.closest(a, |d, n| d.has_class(n, &button)))
                .is_some();
            if !focused {
                return;
            }
        }
        doc.set_display(slider, true);
    }

    // Visibility

    fn hide_guard(&self) -> HideGuard {
        HideGuard {
            always_show_controls: self.config.always_show_controls,
            keyboard_action: self.keyboard_action,
            is_video: self.is_video,
            paused: self.media.paused(),
            ended: self.media.ended(),
            ready_state: self.media.ready_state(),
            current_time: self.media.current_time(),
            hide_on_load: self.config.hide_video_controls_on_load,
            hide_on_pause: self.config.hide_video_controls_on_pause,
        }
    }

    fn set_controls_hidden_dom(&self, doc: &mut Document, hidden: bool) {
        let Some(nodes) = self.chrome else { return };
        let offscreen = self.class("offscreen");
        let mut targets = vec![nodes.controls];
        targets.extend(doc.find_all_by_class(nodes.container, &self.class("control")));
        for node in targets {
            if hidden {
                doc.add_class(node, &offscreen);
            } else {
                doc.remove_class(node, &offscreen);
            }
            doc.remove_style(node, "display");
        }
    }

    fn cancel_fade(&mut self) {
        if let Some(fade) = self.visibility.take_fade_timer() {
            self.timers.cancel(fade);
        }
    }

    fn show_controls_with(&mut self, doc: &mut Document, animate: bool) {
        if self.chrome.is_none() || !self.visibility.should_show() {
            return;
        }
        self.cancel_fade();
        self.set_controls_hidden_dom(doc, false);
        match self.visibility.begin_show(animate) {
            Some(event) => self.emit(event),
            None => {
                let fade = self.timers.schedule(FADE_DURATION, TimerKind::FadeComplete);
                self.visibility.replace_fade_timer(fade);
            }
        }
        debug!(player = %self.id, animate, "Showing controls");
        self.set_controls_size_with(doc);
    }

    fn hide_controls_with(&mut self, doc: &mut Document, animate: bool, force: bool) {
        if self.chrome.is_none() || !self.visibility.is_visible() {
            return;
        }
        if !force && self.hide_guard().blocks_hide() {
            return;
        }
        self.cancel_fade();
        match self.visibility.begin_hide(animate) {
            Some(event) => {
                self.set_controls_hidden_dom(doc, true);
                self.emit(event);
            }
            None => {
                let fade = self.timers.schedule(FADE_DURATION, TimerKind::FadeComplete);
                self.visibility.replace_fade_timer(fade);
            }
        }
        debug!(player = %self.id, animate, force, "Hiding controls");
    }

    fn finish_fade(&mut self, doc: &mut Document) {
        if let Some(event) = self.visibility.finish_fade() {
            if event == ControlsEvent::Hidden {
                self.set_controls_hidden_dom(doc, true);
            }
            self.emit(event);
        }
    }

    fn disable_controls_with(&mut self, doc: &mut Document) {
        self.kill_controls_timer();
        self.visibility.set_enabled(false);
        self.hide_controls_with(doc, false, true);
    }

    fn toggle_playback(&mut self) {
        if self.media.paused() || self.media.ended() {
            self.play();
        } else {
            self.pause();
        }
    }

    // Sizing

    fn set_player_size_with(&mut self, doc: &mut Document, width: Option<Dimension>, height: Option<Dimension>) {
        if !self.config.set_dimensions {
            return;
        }
        // non-finite lengths keep the previous value
        if let Some(width) = width.and_then(Dimension::normalized) {
            self.width = width;
        }
        if let Some(height) = height.and_then(Dimension::normalized) {
            self.height = height;
        }
        if self.chrome.is_none() {
            return;
        }

        let fluid = geometry::is_fluid(self.width, self.height, doc.style(self.node, "max-width"));
        let plan = geometry::plan_sizing(self.config.set_dimensions, self.config.stretching, self.is_video, fluid);
        debug!(player = %self.id, ?plan, width = %self.width, height = %self.height, "Sizing player");
        match plan {
            SizingPlan::Disabled => {}
            SizingPlan::Literal => self.set_dimensions_with(doc, self.width, self.height),
            SizingPlan::Fill => self.set_fill_mode(doc),
            SizingPlan::Responsive => self.set_responsive_mode(doc),
        }
    }

    fn set_dimensions_with(&self, doc: &mut Document, width: Dimension, height: Dimension) {
        let Some(nodes) = self.chrome else { return };
        let (width, height) = (width.to_css(), height.to_css());
        doc.set_style(nodes.container, "width", width.as_str());
        doc.set_style(nodes.container, "height", height.as_str());
        for layer in doc.children(nodes.layers).to_vec() {
            doc.set_style(layer, "width", width.as_str());
            doc.set_style(layer, "height", height.as_str());
        }
    }

    fn set_responsive_mode(&mut self, doc: &mut Document) {
        let Some(nodes) = self.chrome else { return };
        let body = doc.body();
        let parent = doc
            .parent(nodes.container)
            .and_then(|p| doc.closest(p, |d, n| d.is_displayed(n)))
            .unwrap_or(body);
        let attribute = |name: &str| doc.attr(self.node, name).and_then(Dimension::from_css).and_then(|d| d.as_px());

        let input = ResponsiveInput {
            is_video: self.is_video,
            width: self.width,
            height: self.height,
            video_size: self.media.video_size(),
            attribute_size: (attribute("width"), attribute("height")),
            default_video: (self.config.default_video_width, self.config.default_video_height),
            default_audio: (self.config.default_audio_width, self.config.default_audio_height),
            initial_aspect_ratio: self.initial_aspect_ratio,
            parent: doc.measured_size(parent),
            viewport: (parent == body).then(|| doc.viewport()),
        };
        let Some(size) = geometry::responsive_size(&input) else {
            debug!(player = %self.id, "Responsive size unavailable");
            return;
        };

        doc.set_style(nodes.container, "width", Dimension::Px(size.width).to_css());
        doc.set_style(nodes.container, "height", Dimension::Px(size.height).to_css());
        doc.set_style(self.node, "width", "100%");
        doc.set_style(self.node, "height", "100%");
        if self.is_video {
            self.media.set_size(size.width, size.height);
        }
        for layer in doc.children(nodes.layers).to_vec() {
            doc.set_style(layer, "width", "100%");
            doc.set_style(layer, "height", "100%");
        }
    }

    fn set_fill_mode(&mut self, doc: &mut Document) {
        let Some(nodes) = self.chrome else { return };
        let Some(parent) = self.outer_container.or_else(|| doc.parent(nodes.container)) else {
            return;
        };

        for property in ["height", "max-width", "max-height"] {
            doc.remove_style(self.node, property);
        }

        let (mut parent_w, mut parent_h) = doc.measured_size(parent);
        let (offset_w, offset_h) = self.media.offset_size();
        if parent_w <= 0.0 && offset_w > 0.0 {
            parent_w = offset_w;
            doc.set_style(parent, "width", Dimension::Px(offset_w).to_css());
        }
        if parent_h <= 0.0 && offset_h > 0.0 {
            parent_h = offset_h;
            doc.set_style(parent, "height", Dimension::Px(offset_h).to_css());
        }

        self.set_dimensions_with(doc, Dimension::Percent(100.0), Dimension::Percent(100.0));
        if let Some(poster) = doc.find_by_class(nodes.container, &self.class("poster-img")) {
            doc.set_display(poster, true);
        }

        let init = Size::new(
            self.width.as_px().unwrap_or(f64::NAN),
            self.height.as_px().unwrap_or(f64::NAN),
        );
        let FillLayout {
            width,
            height,
            margin_left,
        } = geometry::fill_layout(init, Size::new(parent_w, parent_h));

        let mut targets = vec![self.node];
        for node in doc.find_all_by_tag(nodes.container, &["object", "embed", "iframe", "video"]) {
            if !targets.contains(&node) {
                targets.push(node);
            }
        }
        for target in targets {
            doc.set_style(target, "width", Dimension::Px(width).to_css());
            doc.set_style(target, "height", Dimension::Px(height).to_css());
            doc.set_style(target, "margin-left", format!("{}px", margin_left as i64));
            doc.set_style(target, "margin-top", "0px");
        }
        self.media.set_size(width, height);
    }

    fn set_controls_size_with(&mut self, doc: &mut Document) {
        let Some(nodes) = self.chrome else { return };
        let Some((rail, total)) = self.rail else { return };
        if !doc.is_displayed(nodes.container) || !doc.is_displayed(rail) {
            return;
        }

        let rail_margin = px_style(doc, rail, "margin-left") + px_style(doc, rail, "margin-right");
        let total_margin = px_style(doc, total, "margin-left") + px_style(doc, total, "margin-right");
        let siblings: Vec<f64> = doc
            .parent(rail)
            .map(|p| doc.children(p).to_vec())
            .unwrap_or_default()
            .into_iter()
            .filter(|n| *n != rail && doc.is_displayed(*n))
            .map(|n| doc.measured_size(n).0)
            .collect();
        let controls_width = doc.measured_size(nodes.controls).0;

        let width = geometry::rail_width(controls_width, &siblings, rail_margin, total_margin);
        doc.set_style(rail, "width", Dimension::Px(width).to_css());
        self.emit(ControlsEvent::Resize);
    }

    // Iframe renderers

    fn media_id(&self, doc: &Document) -> String {
        doc.attr(self.node, "id").map(str::to_string).unwrap_or_else(|| self.id.to_string())
    }

    fn create_iframe_layer(&mut self, doc: &mut Document) {
        let renderer = self.media.renderer_name().unwrap_or_default();
        if !self.is_video || !renderer.to_ascii_lowercase().contains("iframe") {
            return;
        }
        let media_id = self.media_id(doc);
        let layer_id = format!("{}-iframe-overlay", media_id);
        if doc.element_by_id(&layer_id).is_some() {
            return;
        }
        let Some(target) = doc.element_by_id(&format!("{}_{}", media_id, renderer)) else {
            warn!(player = %self.id, renderer = %renderer, "Iframe renderer element not found");
            return;
        };
        let layer = doc.create_element("div");
        doc.set_attr(layer, "id", layer_id);
        doc.add_class(layer, &self.class("iframe-overlay"));
        if doc.insert_before(layer, target).is_ok() {
            self.listen(doc, EventTarget::Node(layer), DomEventKind::Click, ChromeHandler::IframeOverlayClick);
        }
    }

    fn remove_iframe_layer(&mut self, doc: &mut Document) {
        let layer_id = format!("{}-iframe-overlay", self.media_id(doc));
        if let Some(layer) = doc.element_by_id(&layer_id) {
            doc.detach(layer);
        }
    }

    // Fullscreen

    fn set_fullscreen_button(&self, doc: &mut Document) {
        let Some(nodes) = self.chrome else { return };
        let Some(button) = doc.find_by_class(nodes.controls, &self.class("fullscreen-button")) else {
            return;
        };
        let (enter, exit) = (self.class("fullscreen"), self.class("unfullscreen"));
        if self.is_fullscreen {
            doc.remove_class(button, &enter);
            doc.add_class(button, &exit);
        } else {
            doc.remove_class(button, &exit);
            doc.add_class(button, &enter);
        }
    }

    fn enter_fullscreen_with(&mut self, doc: &mut Document) {
        let Some(nodes) = self.chrome else { return };
        if self.is_fullscreen || !self.is_video {
            return;
        }
        self.is_fullscreen = true;
        doc.add_class(nodes.container, &self.class("container-fullscreen"));
        self.set_dimensions_with(doc, Dimension::Percent(100.0), Dimension::Percent(100.0));
        let (width, height) = doc.viewport();
        self.media.set_size(width, height);
        self.set_fullscreen_button(doc);
        self.set_controls_size_with(doc);
        info!(player = %self.id, "Entered fullscreen");
    }

    fn exit_fullscreen_with(&mut self, doc: &mut Document) {
        let Some(nodes) = self.chrome else { return };
        if !self.is_fullscreen {
            return;
        }
        self.is_fullscreen = false;
        doc.remove_class(nodes.container, &self.class("container-fullscreen"));
        self.set_player_size_with(doc, None, None);
        self.set_fullscreen_button(doc);
        self.set_controls_size_with(doc);
        info!(player = %self.id, "Exited fullscreen");
    }

    /// Run `f` with the document borrowed, then deliver deferred callbacks
    fn with_document<R>(&mut self, f: impl FnOnce(&mut Self, &mut Document) -> R) -> R {
        let document = Rc::clone(&self.ctx.document);
        let result = {
            let mut doc = document.borrow_mut();
            f(self, &mut *doc)
        };
        self.flush_callbacks();
        result
    }

    // Facade

    /// Start playback, loading first if nothing has played yet
    pub fn play(&mut self) {
        if self.state == PlayerState::Removed {
            return;
        }
        if !self.is_loaded && self.media.current_time() <= 0.0 {
            self.load();
        }
        self.media.play();
    }

    pub fn pause(&mut self) {
        if self.state != PlayerState::Removed {
            self.media.pause();
        }
    }

    /// Load the media once
    pub fn load(&mut self) {
        if !self.is_loaded {
            self.media.load();
        }
        self.is_loaded = true;
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.media.set_muted(muted);
    }

    pub fn set_current_time(&mut self, time: f64) {
        self.media.set_current_time(time);
    }

    pub fn current_time(&self) -> f64 {
        self.media.current_time()
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.media.set_volume(volume);
    }

    pub fn volume(&self) -> f64 {
        self.media.volume()
    }

    /// Swap the source, rebuilding the iframe overlay for iframe renderers
    pub fn set_src(&mut self, src: &str) {
        self.with_document(|player, doc| {
            player.remove_iframe_layer(doc);
            player.media.set_src(src);
            player.create_iframe_layer(doc);
        });
    }

    pub fn set_poster(&mut self, url: &str) {
        self.with_document(|player, doc| {
            let Some(nodes) = player.chrome else { return };
            let Some(poster) = doc.find_by_class(nodes.layers, &player.class("poster")) else {
                return;
            };
            apply_poster(doc, poster, url, &player.config.class_prefix);
            doc.set_display(poster, true);
        });
    }

    /// Replace the skin class on the container
    pub fn change_skin(&mut self, class_name: &str) {
        self.with_document(|player, doc| {
            let Some(nodes) = player.chrome else { return };
            let class = format!("{} {}", player.class("container"), class_name);
            doc.set_class_name(nodes.container, &class);
            player.set_player_size_with(doc, None, None);
            player.set_controls_size_with(doc);
        });
    }

    /// Resize after a short delay
    pub fn reset_size(&mut self) {
        self.timers.schedule(RESET_SIZE_DELAY, TimerKind::ResetSize);
    }

    /// Place `element` in the control bar, reusing the position cached for `key`
    pub fn add_control_element(&mut self, element: NodeId, key: &str) {
        self.with_document(|player, doc| {
            let Some(nodes) = player.chrome else { return };
            features::place_control(doc, nodes.controls, &mut player.feature_positions, element, key);
            player.set_controls_size_with(doc);
        });
    }

    pub fn enter_fullscreen(&mut self) {
        self.with_document(|player, doc| player.enter_fullscreen_with(doc));
    }

    pub fn exit_fullscreen(&mut self) {
        self.with_document(|player, doc| player.exit_fullscreen_with(doc));
    }

    /// Resize to `width` x `height`; `None` keeps the current value
    pub fn set_player_size(&mut self, width: Option<Dimension>, height: Option<Dimension>) {
        self.with_document(|player, doc| player.set_player_size_with(doc, width, height));
    }

    pub fn set_controls_size(&mut self) {
        self.with_document(|player, doc| player.set_controls_size_with(doc));
    }

    pub fn show_controls(&mut self, animate: bool) {
        self.with_document(|player, doc| player.show_controls_with(doc, animate));
    }

    pub fn hide_controls(&mut self, animate: bool) {
        self.with_document(|player, doc| player.hide_controls_with(doc, animate, false));
    }

    /// Schedule an auto-hide, replacing any pending one.
    /// `None` uses `controlsTimeoutDefault`.
    pub fn start_controls_timer(&mut self, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or_else(|| self.config.controls_timeout_default());
        self.kill_controls_timer();
        let timer = self.timers.schedule(timeout, TimerKind::HideControls);
        self.visibility.replace_hide_timer(timer);
        debug!(player = %self.id, timeout_ms = timeout.as_millis() as u64, "Controls timer started");
    }

    pub fn kill_controls_timer(&mut self) {
        if let Some(timer) = self.visibility.take_hide_timer() {
            self.timers.cancel(timer);
        }
    }

    pub fn enable_controls(&mut self) {
        self.with_document(|player, doc| {
            player.show_controls_with(doc, false);
            player.visibility.set_enabled(true);
        });
    }

    pub fn disable_controls(&mut self) {
        self.with_document(|player, doc| player.disable_controls_with(doc));
    }

    // Accessors

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlayerState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events_tx.subscribe()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn context(&self) -> &PlayerContext {
        &self.ctx
    }

    pub fn media(&self) -> &SharedMedia {
        &self.media
    }

    /// The wrapped media node
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn chrome(&self) -> Option<ChromeNodes> {
        self.chrome
    }

    pub fn container(&self) -> Option<NodeId> {
        self.chrome.map(|c| c.container)
    }

    pub fn is_video(&self) -> bool {
        self.is_video
    }

    pub fn uses_native_controls(&self) -> bool {
        self.native_controls
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_fullscreen(&self) -> bool {
        self.is_fullscreen
    }

    pub fn has_focus(&self) -> bool {
        self.focus.get()
    }

    pub fn keyboard_action(&self) -> bool {
        self.keyboard_action
    }

    pub fn controls_visible(&self) -> bool {
        self.visibility.is_visible()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility.state()
    }

    pub fn controls_enabled(&self) -> bool {
        self.visibility.is_enabled()
    }

    pub fn width(&self) -> Dimension {
        self.width
    }

    pub fn height(&self) -> Dimension {
        self.height
    }

    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    /// Number of pending auto-hide timers
    pub fn pending_hide_timers(&self) -> usize {
        self.timers.count_where(|k| *k == TimerKind::HideControls)
    }

    /// Deadline of the pending auto-hide, if any
    pub fn hide_timer_deadline(&self) -> Option<Instant> {
        self.visibility.hide_timer().and_then(|t| self.timers.deadline(t))
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Names of the features that built successfully, in build order
    pub fn built_features(&self) -> Vec<&str> {
        self.features
            .iter()
            .filter(|f| f.built)
            .map(|f| f.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaElement, SimulatedMedia};
    use crate::types::ReadyState;

    fn setup(config: PlayerConfig) -> (Player, Rc<SimulatedMedia>, Rc<ManualClock>) {
        let (ctx, clock) = PlayerContext::manual();
        let video = {
            let mut doc = ctx.document.borrow_mut();
            let body = doc.body();
            let video = doc.create_child(body, "video", "");
            doc.set_attr(video, "id", "clip");
            video
        };
        let media = SimulatedMedia::native().into_shared();
        let player = Player::new(ctx, video, media.clone(), Some(config)).unwrap();
        (player, media, clock)
    }

    fn pump(player: &mut Player, media: &SimulatedMedia) {
        for _ in 0..16 {
            let events = media.take_events();
            if events.is_empty() {
                return;
            }
            for event in events {
                player.handle_media_event(event);
            }
        }
    }

    #[test]
    fn test_construction_builds_chrome() {
        let (player, _media, _clock) = setup(PlayerConfig::default());
        assert_eq!(player.state(), PlayerState::AwaitingMedia);
        let nodes = player.chrome().unwrap();
        let doc = player.context().document.borrow();
        assert!(doc.contains(nodes.container, player.node()));
        assert_eq!(doc.attr(nodes.container, "id"), Some("mep_0"));
        assert_eq!(doc.style(nodes.container, "width"), Some("480px"));
        assert_eq!(doc.node_player(player.node()), Some(player.id()));
    }

    #[test]
    fn test_ready_is_idempotent() {
        let (mut player, media, _clock) = setup(PlayerConfig::default().with_features(&["playpause"]));
        pump(&mut player, &media);
        assert_eq!(player.state(), PlayerState::Ready);
        assert_eq!(player.built_features(), vec!["poster", "keyboard", "overlays", "playpause"]);

        let listeners = player.context().document.borrow().listener_count(player.id());
        player.handle_media_event(MediaEvent::RendererReady);
        assert_eq!(player.context().document.borrow().listener_count(player.id()), listeners);
    }

    #[test]
    fn test_controls_timer_replaces_previous() {
        let (mut player, media, _clock) = setup(PlayerConfig::default());
        pump(&mut player, &media);

        let start = player.timers.now();
        player.start_controls_timer(Some(Duration::from_millis(1000)));
        player.start_controls_timer(Some(Duration::from_millis(3000)));
        assert_eq!(player.pending_hide_timers(), 1);
        assert_eq!(player.hide_timer_deadline(), Some(start + Duration::from_millis(3000)));
    }

    #[test]
    fn test_remove_cancels_outstanding_timers() {
        let (mut player, media, clock) = setup(PlayerConfig::default());
        pump(&mut player, &media);
        media.set_ready_state(ReadyState::HaveEnoughData);
        media.play();
        pump(&mut player, &media);

        player.start_controls_timer(Some(Duration::from_millis(1000)));
        let container = player.container().unwrap();
        let focus_out = DomEvent::new(DomEventKind::FocusOut, EventTarget::Node(container));
        let matched = player.context().document.borrow().dispatch(&focus_out);
        for (_, listener) in matched {
            player.handle_dom_event(listener, &focus_out);
        }
        assert!(player.pending_timers() >= 2);

        player.remove().unwrap();
        assert_eq!(player.pending_timers(), 0);
        assert_eq!(player.hide_timer_deadline(), None);

        clock.advance(Duration::from_secs(5));
        assert_eq!(player.fire_due_timers(), 0);
        assert!(player.timers.take_due().is_empty());
        assert_eq!(player.state(), PlayerState::Removed);
    }

    #[test]
    fn test_hide_is_noop_with_always_show_controls() {
        let config = PlayerConfig {
            always_show_controls: true,
            ..PlayerConfig::default()
        };
        let (mut player, media, _clock) = setup(config);
        pump(&mut player, &media);
        media.set_ready_state(ReadyState::HaveEnoughData);
        media.play();
        pump(&mut player, &media);

        player.hide_controls(false);
        assert!(player.controls_visible());
    }

    #[test]
    fn test_animated_hide_completes_after_fade() {
        let (mut player, media, clock) = setup(PlayerConfig::default());
        pump(&mut player, &media);
        media.set_ready_state(ReadyState::HaveEnoughData);
        media.play();
        pump(&mut player, &media);
        let mut events = player.subscribe();

        player.hide_controls(true);
        assert_eq!(player.visibility(), Visibility::FadingOut);
        clock.advance(FADE_DURATION);
        assert_eq!(player.fire_due_timers(), 1);
        assert_eq!(player.visibility(), Visibility::Hidden);
        assert_eq!(events.try_recv().unwrap().kind, ControlsEvent::Hidden);

        let controls = player.chrome().unwrap().controls;
        assert!(player.context().document.borrow().has_class(controls, "mejs__offscreen"));
    }

    #[test]
    fn test_error_disables_controls_and_calls_back() {
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let config = PlayerConfig {
            error: Some(crate::config::Callback::new(move |_| counter.set(counter.get() + 1))),
            ..PlayerConfig::default()
        };
        let (mut player, media, _clock) = setup(config);
        pump(&mut player, &media);

        media.fail(MediaError::new(4, "unsupported source"));
        pump(&mut player, &media);
        assert_eq!(hits.get(), 1);
        assert!(!player.controls_enabled());
        assert!(!player.controls_visible());
    }

    #[test]
    fn test_remove_twice_fails() {
        let (mut player, media, _clock) = setup(PlayerConfig::default());
        pump(&mut player, &media);
        player.remove().unwrap();
        assert!(matches!(player.remove(), Err(Error::PlayerRemoved(_))));
    }
}
