//! Feature builder registry
//!
//! A feature is a named, independently buildable piece of chrome: the poster
//! layer, the overlays, a control bar button. Features are looked up by name
//! in a [`FeatureRegistry`] and built in order once the renderer is ready.
//! A failing build or cleanup is logged and the remaining features carry on.
//!
//! Features see the document, the media element and the configuration
//! through a [`FeatureContext`]. Player-level effects go through
//! [`FeatureContext::request`].

mod controls;
mod keyboard;
mod overlays;
mod poster;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, warn};

pub use controls::{CurrentTimeFeature, DurationFeature, FullscreenFeature, PlayPauseFeature, ProgressFeature, VolumeFeature};
pub use keyboard::KeyboardFeature;
pub use overlays::OverlaysFeature;
pub use poster::{apply_poster, PosterFeature};

use crate::command::{CommandQueue, PlayerCommand};
use crate::config::PlayerConfig;
use crate::dom::{Document, DomEvent, DomEventKind, EventTarget, ListenerId, NodeId};
use crate::media::{MediaElement, MediaEvent};
use crate::player::Route;
use crate::types::PlayerId;
use crate::Result;

/// Features built for every player with chrome, ahead of the configured list
pub const BUILTIN_FEATURES: [&str; 3] = ["poster", "keyboard", "overlays"];

/// DOM nodes the player builds around the media element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromeNodes {
    pub media_node: NodeId,
    pub container: NodeId,
    pub inner: NodeId,
    pub media_wrapper: NodeId,
    pub layers: NodeId,
    pub controls: NodeId,
    pub offscreen: NodeId,
}

/// Player state features may read
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub is_video: bool,
    pub time_format: String,
    pub frames_per_second: u32,
    pub is_fullscreen: bool,
    pub controls_visible: bool,
}

pub struct FeatureContext<'a> {
    pub player: PlayerId,
    pub doc: &'a mut Document,
    pub nodes: ChromeNodes,
    pub media: &'a dyn MediaElement,
    pub config: &'a PlayerConfig,
    pub view: &'a PlayerView,
    feature_index: usize,
    positions: &'a mut HashMap<String, usize>,
    routes: &'a mut HashMap<ListenerId, Route>,
    commands: &'a mut CommandQueue,
}

impl FeatureContext<'_> {
    /// Register a listener routed back to this feature
    pub fn listen(&mut self, target: EventTarget, kind: DomEventKind) -> ListenerId {
        let id = self.doc.add_listener(target, kind, self.player);
        self.routes.insert(id, Route::Feature(self.feature_index));
        id
    }

    pub fn unlisten(&mut self, id: ListenerId) {
        self.doc.remove_listener(id);
        self.routes.remove(&id);
    }

    pub fn request(&mut self, command: PlayerCommand) {
        self.commands.push(command);
    }

    pub fn class(&self, name: &str) -> String {
        self.config.class(name)
    }

    /// Append to the control bar, or re-insert at the cached position for `key`
    pub fn add_control_element(&mut self, element: NodeId, key: &str) {
        place_control(self.doc, self.nodes.controls, self.positions, element, key);
    }

    /// A control-bar button: `<div class="{prefix}button {classes}"><button/></div>`
    pub fn create_button(&mut self, classes: &str, label: &str) -> (NodeId, NodeId) {
        let wrapper = self.doc.create_element("div");
        let class = format!("{} {}", self.class("button"), classes);
        self.doc.add_class(wrapper, &class);
        let button = self.doc.create_child(wrapper, "button", "");
        self.doc.set_attr(button, "type", "button");
        self.doc.set_attr(button, "aria-label", label);
        self.doc.set_attr(button, "title", label);
        (wrapper, button)
    }
}

pub(crate) fn place_control(
    doc: &mut Document,
    controls: NodeId,
    positions: &mut HashMap<String, usize>,
    element: NodeId,
    key: &str,
) {
    match positions.get(key) {
        Some(&index) => doc.insert_child_at(controls, element, index),
        None => {
            doc.append_child(controls, element);
            let index = doc.children(controls).len().saturating_sub(1);
            positions.insert(key.to_string(), index);
        }
    }
}

/// A buildable piece of chrome
pub trait Feature {
    fn build(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()>;

    fn clean(&mut self, _ctx: &mut FeatureContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_media_event(&mut self, _ctx: &mut FeatureContext<'_>, _event: &MediaEvent) {}

    /// A listener registered with [`FeatureContext::listen`] fired
    fn on_dom_event(&mut self, _ctx: &mut FeatureContext<'_>, _listener: ListenerId, _event: &DomEvent) {}
}

pub type FeatureFactory = Rc<dyn Fn() -> Box<dyn Feature>>;

/// Feature name to constructor
#[derive(Default)]
pub struct FeatureRegistry {
    factories: RefCell<BTreeMap<String, FeatureFactory>>,
}

impl fmt::Debug for FeatureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureRegistry")
            .field("features", &self.names())
            .finish()
    }
}

impl FeatureRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in feature
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register("poster", || Box::new(PosterFeature::default()));
        registry.register("keyboard", || Box::new(KeyboardFeature::default()));
        registry.register("overlays", || Box::new(OverlaysFeature::default()));
        registry.register("playpause", || Box::new(PlayPauseFeature::default()));
        registry.register("current", || Box::new(CurrentTimeFeature::default()));
        registry.register("duration", || Box::new(DurationFeature::default()));
        registry.register("progress", || Box::new(ProgressFeature::default()));
        registry.register("volume", || Box::new(VolumeFeature::default()));
        registry.register("fullscreen", || Box::new(FullscreenFeature::default()));
        registry
    }

    pub fn register(&self, name: impl Into<String>, factory: impl Fn() -> Box<dyn Feature> + 'static) {
        self.factories.borrow_mut().insert(name.into(), Rc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.borrow().keys().cloned().collect()
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn Feature>> {
        let factory = self.factories.borrow().get(name).cloned()?;
        Some(factory())
    }
}

pub(crate) struct MountedFeature {
    pub name: String,
    pub feature: Box<dyn Feature>,
    pub built: bool,
}

impl fmt::Debug for MountedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedFeature")
            .field("name", &self.name)
            .field("built", &self.built)
            .finish()
    }
}

/// Instantiate the built-ins followed by the configured features.
/// Unknown names are skipped.
pub(crate) fn mount(registry: &FeatureRegistry, player: PlayerId, configured: &[String]) -> Vec<MountedFeature> {
    let mut mounted: Vec<MountedFeature> = Vec::new();
    let names = BUILTIN_FEATURES.iter().map(|s| s.to_string()).chain(configured.iter().cloned());
    for name in names {
        if mounted.iter().any(|m| m.name == name) {
            debug!(player = %player, feature = %name, "Feature already mounted");
            continue;
        }
        match registry.create(&name) {
            Some(feature) => mounted.push(MountedFeature {
                name,
                feature,
                built: false,
            }),
            None => warn!(player = %player, feature = %name, "Unknown feature, skipping"),
        }
    }
    mounted
}

/// The pieces of a player a [`FeatureContext`] borrows
pub(crate) struct FeatureHost<'a> {
    pub player: PlayerId,
    pub doc: &'a mut Document,
    pub nodes: ChromeNodes,
    pub media: &'a dyn MediaElement,
    pub config: &'a PlayerConfig,
    pub view: &'a PlayerView,
    pub positions: &'a mut HashMap<String, usize>,
    pub routes: &'a mut HashMap<ListenerId, Route>,
    pub commands: &'a mut CommandQueue,
}

impl FeatureHost<'_> {
    fn context(&mut self, feature_index: usize) -> FeatureContext<'_> {
        FeatureContext {
            player: self.player,
            doc: &mut *self.doc,
            nodes: self.nodes,
            media: self.media,
            config: self.config,
            view: self.view,
            feature_index,
            positions: &mut *self.positions,
            routes: &mut *self.routes,
            commands: &mut *self.commands,
        }
    }
}

/// Build every mounted feature, returning how many failed
pub(crate) fn build_all(features: &mut [MountedFeature], host: &mut FeatureHost<'_>) -> usize {
    let mut failed = 0;
    for (index, mounted) in features.iter_mut().enumerate() {
        let mut ctx = host.context(index);
        match mounted.feature.build(&mut ctx) {
            Ok(()) => {
                mounted.built = true;
                debug!(player = %host.player, feature = %mounted.name, "Feature built");
            }
            Err(e) => {
                failed += 1;
                error!(
                    player = %host.player,
                    feature = %mounted.name,
                    code = e.error_code(),
                    recoverable = e.is_recoverable(),
                    error = %e,
                    "Feature build failed"
                );
            }
        }
    }
    failed
}

/// Clean every built feature, returning how many failed
pub(crate) fn clean_all(features: &mut [MountedFeature], host: &mut FeatureHost<'_>) -> usize {
    let mut failed = 0;
    for (index, mounted) in features.iter_mut().enumerate() {
        if !mounted.built {
            continue;
        }
        let mut ctx = host.context(index);
        if let Err(e) = mounted.feature.clean(&mut ctx) {
            failed += 1;
            error!(
                player = %host.player,
                feature = %mounted.name,
                code = e.error_code(),
                recoverable = e.is_recoverable(),
                error = %e,
                "Feature cleanup failed"
            );
        }
        mounted.built = false;
    }
    failed
}

pub(crate) fn media_event(features: &mut [MountedFeature], host: &mut FeatureHost<'_>, event: &MediaEvent) {
    for (index, mounted) in features.iter_mut().enumerate() {
        if mounted.built {
            let mut ctx = host.context(index);
            mounted.feature.on_media_event(&mut ctx, event);
        }
    }
}

pub(crate) fn dom_event(
    features: &mut [MountedFeature],
    host: &mut FeatureHost<'_>,
    index: usize,
    listener: ListenerId,
    event: &DomEvent,
) {
    if let Some(mounted) = features.get_mut(index).filter(|m| m.built) {
        let mut ctx = host.context(index);
        mounted.feature.on_dom_event(&mut ctx, listener, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::SimulatedMedia;
    use crate::Error;

    struct Noop;

    impl Feature for Noop {
        fn build(&mut self, _ctx: &mut FeatureContext<'_>) -> Result<()> {
            Ok(())
        }
    }

    type Log = Rc<RefCell<Vec<String>>>;

    /// Builds a control and records its cleanup
    struct Recording {
        name: &'static str,
        log: Log,
    }

    impl Feature for Recording {
        fn build(&mut self, ctx: &mut FeatureContext<'_>) -> Result<()> {
            let element = ctx.doc.create_element("div");
            ctx.add_control_element(element, self.name);
            self.log.borrow_mut().push(format!("build {}", self.name));
            Ok(())
        }

        fn clean(&mut self, _ctx: &mut FeatureContext<'_>) -> Result<()> {
            self.log.borrow_mut().push(format!("clean {}", self.name));
            Ok(())
        }
    }

    struct FailsToBuild;

    impl Feature for FailsToBuild {
        fn build(&mut self, _ctx: &mut FeatureContext<'_>) -> Result<()> {
            Err(Error::feature_build("broken", "missing layer"))
        }
    }

    struct FailsToClean;

    impl Feature for FailsToClean {
        fn build(&mut self, _ctx: &mut FeatureContext<'_>) -> Result<()> {
            Ok(())
        }

        fn clean(&mut self, _ctx: &mut FeatureContext<'_>) -> Result<()> {
            Err(Error::feature_cleanup("sticky", "listener already gone"))
        }
    }

    fn mounted(name: &str, feature: Box<dyn Feature>) -> MountedFeature {
        MountedFeature {
            name: name.to_string(),
            feature,
            built: false,
        }
    }

    fn chrome(doc: &mut Document) -> ChromeNodes {
        let body = doc.body();
        let container = doc.create_child(body, "div", "container");
        ChromeNodes {
            media_node: doc.create_child(container, "video", ""),
            container,
            inner: doc.create_child(container, "div", "inner"),
            media_wrapper: doc.create_child(container, "div", "mediaelement"),
            layers: doc.create_child(container, "div", "layers"),
            controls: doc.create_child(container, "div", "controls"),
            offscreen: doc.create_child(body, "span", "offscreen"),
        }
    }

    #[test]
    fn test_failures_are_isolated_per_feature() {
        let mut doc = Document::new();
        let nodes = chrome(&mut doc);
        let media = SimulatedMedia::native();
        let config = PlayerConfig::default();
        let view = PlayerView {
            is_video: true,
            time_format: "mm:ss".to_string(),
            frames_per_second: 25,
            is_fullscreen: false,
            controls_visible: true,
        };
        let mut positions = HashMap::new();
        let mut routes = HashMap::new();
        let mut commands = CommandQueue::new();
        let log: Log = Rc::default();

        let mut features = vec![
            mounted("first", Box::new(Recording { name: "first", log: log.clone() })),
            mounted("broken", Box::new(FailsToBuild)),
            mounted("sticky", Box::new(FailsToClean)),
            mounted("last", Box::new(Recording { name: "last", log: log.clone() })),
        ];
        let mut host = FeatureHost {
            player: PlayerId(0),
            doc: &mut doc,
            nodes,
            media: &media,
            config: &config,
            view: &view,
            positions: &mut positions,
            routes: &mut routes,
            commands: &mut commands,
        };

        assert_eq!(build_all(&mut features, &mut host), 1);
        let built: Vec<bool> = features.iter().map(|f| f.built).collect();
        assert_eq!(built, vec![true, false, true, true]);
        assert_eq!(host.doc.children(nodes.controls).len(), 2);

        assert_eq!(clean_all(&mut features, &mut host), 1);
        assert!(features.iter().all(|f| !f.built));
        assert_eq!(*log.borrow(), vec!["build first", "build last", "clean first", "clean last"]);
    }

    #[test]
    fn test_builtin_registry() {
        let registry = FeatureRegistry::with_builtins();
        for name in ["poster", "keyboard", "overlays", "playpause", "progress", "fullscreen"] {
            assert!(registry.contains(name), "{name}");
        }
        assert!(!registry.contains("tracks"));
    }

    #[test]
    fn test_mount_order_skips_unknown_and_duplicates() {
        let registry = FeatureRegistry::with_builtins();
        registry.register("custom", || Box::new(Noop));
        let configured: Vec<String> = ["playpause", "tracks", "poster", "custom"].iter().map(|s| s.to_string()).collect();

        let names: Vec<String> = mount(&registry, PlayerId(0), &configured).into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["poster", "keyboard", "overlays", "playpause", "custom"]);
    }

    #[test]
    fn test_place_control_uses_cached_position() {
        let mut doc = Document::new();
        let controls = doc.create_child(doc.body(), "div", "controls");
        let mut positions = HashMap::new();

        let a = doc.create_element("div");
        let b = doc.create_element("div");
        place_control(&mut doc, controls, &mut positions, a, "a");
        place_control(&mut doc, controls, &mut positions, b, "b");
        assert_eq!(positions.get("b"), Some(&1));

        // rebuilding "a" lands back in its slot
        doc.detach(a);
        let a2 = doc.create_element("div");
        place_control(&mut doc, controls, &mut positions, a2, "a");
        assert_eq!(doc.children(controls), &[a2, b]);
    }
}
