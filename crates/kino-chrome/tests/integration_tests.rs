//! Integration tests for Kino Chrome

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use kino_chrome::keyboard::codes;
use kino_chrome::timer::Clock;
use kino_chrome::{
    Callback, Dimension, DomEvent, DomEventKind, Error, EventLoop, EventTarget, Feature, FeatureContext, HostInput,
    KeyAction, KeyCommand, ManualClock, PlayerCommand,
    MediaElement, NodeId, PlayerConfig, PlayerContext, PlayerId, PlayerState, ReadyState, SimulatedMedia,
    StretchingMode, Visibility,
};

fn page() -> (EventLoop, Rc<ManualClock>) {
    let (ctx, clock) = PlayerContext::manual();
    (EventLoop::new(ctx), clock)
}

fn add_video(event_loop: &EventLoop, id: &str) -> NodeId {
    let mut doc = event_loop.document().borrow_mut();
    let body = doc.body();
    let video = doc.create_child(body, "video", "");
    doc.set_attr(video, "id", id);
    video
}

fn create(event_loop: &mut EventLoop, id: &str, config: PlayerConfig) -> (PlayerId, NodeId, Rc<SimulatedMedia>) {
    let node = add_video(event_loop, id);
    let media = SimulatedMedia::native().into_shared();
    let player = event_loop.create_player(node, media.clone(), Some(config)).unwrap();
    (player, node, media)
}

fn start_playing(event_loop: &mut EventLoop, player: PlayerId, media: &SimulatedMedia) {
    media.set_ready_state(ReadyState::HaveEnoughData);
    event_loop.player_mut(player).unwrap().play();
    event_loop.pump();
}

fn press(event_loop: &mut EventLoop, node: NodeId, key: u32) {
    event_loop.dispatch(DomEvent::key_down(node, key));
}

fn assert_defined(css: Option<&str>) {
    let css = css.expect("dimension set");
    assert!(!css.contains("NaN"), "undefined dimension {css}");
    assert!(!css.starts_with('-'), "negative dimension {css}");
    let dimension = Dimension::parse(css).unwrap();
    if let Some(px) = dimension.as_px() {
        assert!(px >= 0.0, "negative dimension {css}");
    }
}

// =============================================================================
// Sizing Tests
// =============================================================================

#[test]
fn test_sizing_never_undefined() {
    let modes = [
        StretchingMode::Auto,
        StretchingMode::Fill,
        StretchingMode::Responsive,
        StretchingMode::None,
    ];
    let widths = [
        None,
        Some(Dimension::Percent(100.0)),
        Some(Dimension::Px(-20.0)),
        Some(Dimension::Percent(f64::NAN)),
        Some(Dimension::Percent(-50.0)),
    ];
    let resizes = [Dimension::Px(f64::NAN), Dimension::Percent(f64::NAN), Dimension::Percent(-50.0)];

    for mode in modes {
        for (width, resize) in widths.into_iter().zip(resizes.into_iter().cycle()) {
            let (mut event_loop, _clock) = page();
            let config = PlayerConfig {
                stretching: mode,
                video_width: width,
                ..PlayerConfig::default()
            };
            let (id, _node, media) = create(&mut event_loop, "clip", config);
            media.load_metadata(f64::NAN, None);
            event_loop.pump();
            event_loop
                .player_mut(id)
                .unwrap()
                .set_player_size(Some(resize), None);

            let container = event_loop.player(id).unwrap().container().unwrap();
            let doc = event_loop.document().borrow();
            assert_defined(doc.style(container, "width"));
            assert_defined(doc.style(container, "height"));
        }
    }
}

#[test]
fn test_non_finite_options_fall_back() {
    let (mut event_loop, _clock) = page();
    let config = PlayerConfig::from_json(r#"{"videoWidth":"NaN%","videoHeight":"-50%","stretching":"none"}"#).unwrap();
    let (id, _node, _media) = create(&mut event_loop, "clip", config);

    let container = event_loop.player(id).unwrap().container().unwrap();
    let doc = event_loop.document().borrow();
    assert_defined(doc.style(container, "width"));
    assert_eq!(doc.style(container, "height"), Some("0%"));
}

#[test]
fn test_fill_covers_parent() {
    let (mut event_loop, _clock) = page();
    event_loop.document().borrow_mut().set_viewport(800.0, 600.0);
    let config = PlayerConfig {
        stretching: StretchingMode::Fill,
        ..PlayerConfig::default()
    };
    let (id, node, media) = create(&mut event_loop, "clip", config);

    let container = event_loop.player(id).unwrap().container().unwrap();
    let doc = event_loop.document().borrow();
    assert_eq!(doc.style(container, "width"), Some("100%"));
    assert_eq!(doc.style(node, "width"), Some("1066px"));
    assert_eq!(doc.style(node, "height"), Some("600px"));
    assert_eq!(doc.style(node, "margin-left"), Some("-133px"));
    let wrapper = doc.parent(container).unwrap();
    assert!(doc.has_class(wrapper, "mejs__fill-container"));
    assert!(media.last_size().is_some());
}

#[test]
fn test_autosize_on_metadata() {
    let (mut event_loop, _clock) = page();
    let (id, _node, media) = create(&mut event_loop, "clip", PlayerConfig::default());
    media.load_metadata(120.0, Some((640.0, 360.0)));
    event_loop.pump();

    let player = event_loop.player(id).unwrap();
    assert_eq!(player.width(), Dimension::Px(640.0));
    assert_eq!(player.height(), Dimension::Px(360.0));
    let container = player.container().unwrap();
    assert_eq!(event_loop.document().borrow().style(container, "width"), Some("640px"));
}

#[test]
fn test_time_format_grows_with_hour_long_media() {
    let (mut event_loop, _clock) = page();
    let (id, _node, media) = create(&mut event_loop, "clip", PlayerConfig::default());
    media.load_metadata(4000.0, None);
    event_loop.pump();
    assert_eq!(event_loop.player(id).unwrap().time_format(), "hh:mm:ss");
}

// =============================================================================
// Visibility Tests
// =============================================================================

#[test]
fn test_hide_noop_with_always_show_controls() {
    let (mut event_loop, _clock) = page();
    let config = PlayerConfig {
        always_show_controls: true,
        ..PlayerConfig::default()
    };
    let (id, _node, media) = create(&mut event_loop, "clip", config);
    start_playing(&mut event_loop, id, &media);

    let player = event_loop.player_mut(id).unwrap();
    player.hide_controls(false);
    player.hide_controls(true);
    assert!(player.controls_visible());
    assert_eq!(player.visibility(), Visibility::Visible);
}

#[test]
fn test_restarted_timer_leaves_one_pending_hide() {
    let (mut event_loop, clock) = page();
    let (id, _node, media) = create(&mut event_loop, "clip", PlayerConfig::default());
    start_playing(&mut event_loop, id, &media);

    let start = clock.now();
    {
        let player = event_loop.player_mut(id).unwrap();
        player.start_controls_timer(Some(Duration::from_millis(1000)));
        player.start_controls_timer(Some(Duration::from_millis(3000)));
        assert_eq!(player.pending_hide_timers(), 1);
        assert_eq!(player.hide_timer_deadline(), Some(start + Duration::from_millis(3000)));
    }

    clock.advance(Duration::from_millis(1000));
    event_loop.fire_due_timers();
    assert!(event_loop.player(id).unwrap().controls_visible());

    clock.advance(Duration::from_millis(2000));
    event_loop.fire_due_timers();
    assert_eq!(event_loop.player(id).unwrap().visibility(), Visibility::FadingOut);

    clock.advance(Duration::from_millis(200));
    event_loop.fire_due_timers();
    assert_eq!(event_loop.player(id).unwrap().visibility(), Visibility::Hidden);
}

#[test]
fn test_paused_video_keeps_controls() {
    let (mut event_loop, _clock) = page();
    let (id, _node, media) = create(&mut event_loop, "clip", PlayerConfig::default());
    media.set_ready_state(ReadyState::HaveEnoughData);
    event_loop.pump();

    let player = event_loop.player_mut(id).unwrap();
    player.hide_controls(false);
    assert!(player.controls_visible());
}

#[test]
fn test_mouse_leave_hides_playing_video() {
    let (mut event_loop, clock) = page();
    let (id, _node, media) = create(&mut event_loop, "clip", PlayerConfig::default());
    start_playing(&mut event_loop, id, &media);

    let container = event_loop.player(id).unwrap().container().unwrap();
    event_loop.dispatch(DomEvent::new(DomEventKind::MouseLeave, EventTarget::Node(container)));
    clock.advance(Duration::from_millis(1000));
    event_loop.fire_due_timers();
    clock.advance(Duration::from_millis(200));
    event_loop.fire_due_timers();
    assert_eq!(event_loop.player(id).unwrap().visibility(), Visibility::Hidden);

    event_loop.dispatch(DomEvent::new(DomEventKind::MouseMove, EventTarget::Node(container)));
    assert!(event_loop.player(id).unwrap().controls_visible());
}

#[test]
fn test_error_hides_and_disables_controls() {
    let (mut event_loop, _clock) = page();
    let (id, _node, media) = create(&mut event_loop, "clip", PlayerConfig::default());
    media.fail(kino_chrome::MediaError::new(4, "no supported source"));
    event_loop.pump();

    let player = event_loop.player_mut(id).unwrap();
    assert!(!player.controls_enabled());
    assert!(!player.controls_visible());
    player.enable_controls();
    assert!(player.controls_enabled());
    assert!(player.controls_visible());
}

// =============================================================================
// Keyboard Tests
// =============================================================================

#[test]
fn test_space_toggles_only_focused_player() {
    let (mut event_loop, _clock) = page();
    let (_a, node_a, media_a) = create(&mut event_loop, "a", PlayerConfig::default());
    let (_b, node_b, media_b) = create(&mut event_loop, "b", PlayerConfig::default());

    press(&mut event_loop, node_b, codes::SPACE);
    assert!(media_a.paused());
    assert!(!media_b.paused());

    press(&mut event_loop, node_a, codes::SPACE);
    assert!(!media_a.paused());

    press(&mut event_loop, node_a, codes::SPACE);
    assert!(media_a.paused());
}

#[test]
fn test_key_inside_container_counts_as_keyboard_action() {
    let (mut event_loop, _clock) = page();
    let config = PlayerConfig {
        key_actions: vec![KeyAction::new(
            [72],
            KeyCommand::custom(|ctx| ctx.request(PlayerCommand::HideControls { animate: false })),
        )],
        ..PlayerConfig::default()
    };
    let (id, node, media) = create(&mut event_loop, "clip", config);
    start_playing(&mut event_loop, id, &media);
    assert!(event_loop.player(id).unwrap().controls_visible());

    // the container marks the keyboard action before the key table runs
    press(&mut event_loop, node, 72);
    let player = event_loop.player(id).unwrap();
    assert!(player.keyboard_action());
    assert!(player.controls_visible());
}

#[test]
fn test_volume_steps_stay_in_range() {
    let (mut event_loop, _clock) = page();
    let (id, node, media) = create(&mut event_loop, "clip", PlayerConfig::default());
    assert!((media.volume() - 0.8).abs() < 1e-9);

    event_loop.player_mut(id).unwrap().set_volume(0.05);
    for _ in 0..3 {
        press(&mut event_loop, node, codes::DOWN);
        assert!((0.0..=1.0).contains(&media.volume()));
    }
    assert_eq!(media.volume(), 0.0);
    assert!(media.muted());

    for _ in 0..15 {
        press(&mut event_loop, node, codes::UP);
        assert!((0.0..=1.0).contains(&media.volume()));
    }
    assert_eq!(media.volume(), 1.0);
    assert!(!media.muted());
}

#[test]
fn test_keyboard_disabled() {
    let (mut event_loop, _clock) = page();
    let config = PlayerConfig {
        enable_keyboard: false,
        ..PlayerConfig::default()
    };
    let (_id, node, media) = create(&mut event_loop, "clip", config);
    press(&mut event_loop, node, codes::SPACE);
    assert!(media.paused());
}

#[test]
fn test_fullscreen_key() {
    let (mut event_loop, _clock) = page();
    let (id, node, _media) = create(&mut event_loop, "clip", PlayerConfig::default());

    press(&mut event_loop, node, codes::F);
    let player = event_loop.player(id).unwrap();
    assert!(player.is_fullscreen());
    let container = player.container().unwrap();
    assert!(event_loop.document().borrow().has_class(container, "mejs__container-fullscreen"));

    press(&mut event_loop, node, codes::F);
    assert!(!event_loop.player(id).unwrap().is_fullscreen());
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_remove_restores_media_node() {
    let (mut event_loop, _clock) = page();
    let config = PlayerConfig::default().with_features(&["playpause"]);
    let (id, _node, media) = create(&mut event_loop, "clip", config);
    let container = event_loop.player(id).unwrap().container().unwrap();

    let restored = event_loop.remove_player(id).unwrap();
    let doc = event_loop.document().borrow();
    assert!(doc.is_attached(restored));
    assert_eq!(doc.tag(restored), "video");
    assert!(doc.has_attr(restored, "controls"));
    assert_eq!(doc.attr(restored, "id"), Some("clip"));
    assert!(!doc.is_attached(container));
    assert_eq!(doc.listener_count(id), 0);
    assert!(!event_loop.context().registry.contains(id));
    assert!(media.is_destroyed());
}

#[test]
fn test_remove_with_detached_chrome_finishes_teardown() {
    let (mut event_loop, _clock) = page();
    let (id, _node, media) = create(&mut event_loop, "clip", PlayerConfig::default());
    let container = event_loop.player(id).unwrap().container().unwrap();
    event_loop.document().borrow_mut().detach(container);

    let restored = event_loop.remove_player(id).unwrap();
    let doc = event_loop.document().borrow();
    assert_eq!(doc.parent(restored), Some(doc.body()));
    assert_eq!(doc.listener_count(id), 0);
    assert!(!event_loop.context().registry.contains(id));
    assert!(media.is_destroyed());
}

#[test]
fn test_wrapping_twice_fails() {
    let (mut event_loop, _clock) = page();
    let (id, node, _media) = create(&mut event_loop, "clip", PlayerConfig::default());
    let again = event_loop.create_player(node, SimulatedMedia::native().into_shared(), None);
    assert!(matches!(again, Err(Error::AlreadyWrapped(existing)) if existing == id));
}

#[test]
fn test_unknown_features_are_skipped() {
    let (mut event_loop, _clock) = page();
    let config = PlayerConfig::default().with_features(&["playpause", "bogus", "volume"]);
    let (id, _node, _media) = create(&mut event_loop, "clip", config);
    assert_eq!(
        event_loop.player(id).unwrap().built_features(),
        vec!["poster", "keyboard", "overlays", "playpause", "volume"]
    );
}

struct BrokenFeature;

impl Feature for BrokenFeature {
    fn build(&mut self, _ctx: &mut FeatureContext<'_>) -> kino_chrome::Result<()> {
        Err(Error::feature_build("broken", "no layer to attach to"))
    }
}

#[test]
fn test_failing_feature_does_not_stop_the_rest() {
    let (mut event_loop, _clock) = page();
    event_loop
        .context()
        .features
        .register("broken", || Box::new(BrokenFeature));
    let config = PlayerConfig::default().with_features(&["playpause", "broken", "volume"]);
    let (id, node, _media) = create(&mut event_loop, "clip", config);
    assert_eq!(
        event_loop.player(id).unwrap().built_features(),
        vec!["poster", "keyboard", "overlays", "playpause", "volume"]
    );

    let restored = event_loop.remove_player(id).unwrap();
    assert_ne!(restored, node);
    assert_eq!(event_loop.document().borrow().listener_count(id), 0);
}

#[test]
fn test_options_attribute_and_named_success_callback() {
    let (mut event_loop, _clock) = page();
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    event_loop
        .context()
        .callbacks
        .register("onReady", move |_| counter.set(counter.get() + 1));

    let node = add_video(&event_loop, "clip");
    event_loop.document().borrow_mut().set_attr(
        node,
        "data-mejsoptions",
        r#"{"alwaysShowControls": true, "features": ["playpause"], "success": "onReady"}"#,
    );
    let id = event_loop
        .create_player(node, SimulatedMedia::native().into_shared(), None)
        .unwrap();

    let player = event_loop.player(id).unwrap();
    assert!(player.config().always_show_controls);
    assert!(matches!(player.config().success, Some(Callback::Named(ref name)) if name == "onReady"));
    assert_eq!(player.state(), PlayerState::Ready);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_playing_one_pauses_the_other() {
    let (mut event_loop, _clock) = page();
    let (a, _, media_a) = create(&mut event_loop, "a", PlayerConfig::default());
    let (b, _, media_b) = create(&mut event_loop, "b", PlayerConfig::default());

    start_playing(&mut event_loop, b, &media_b);
    start_playing(&mut event_loop, a, &media_a);

    assert!(!media_a.paused());
    assert!(media_b.paused());
    assert_eq!(event_loop.player(a).unwrap().state(), PlayerState::Playing);
    assert_eq!(event_loop.player(b).unwrap().state(), PlayerState::Paused);
    assert!(!event_loop.player(b).unwrap().has_focus());
}

#[test]
fn test_pause_others_uses_the_playing_players_option() {
    let (mut event_loop, _clock) = page();
    let opted_out = PlayerConfig {
        pause_other_players: false,
        ..PlayerConfig::default()
    };
    let (a, _, media_a) = create(&mut event_loop, "a", PlayerConfig::default());
    let (b, _, media_b) = create(&mut event_loop, "b", opted_out);

    start_playing(&mut event_loop, b, &media_b);
    start_playing(&mut event_loop, a, &media_a);
    assert!(media_b.paused());

    start_playing(&mut event_loop, b, &media_b);
    assert!(!media_a.paused());
    assert!(!media_b.paused());
}

#[test]
fn test_ended_rewinds_and_shows_controls() {
    let (mut event_loop, _clock) = page();
    let (id, _node, media) = create(&mut event_loop, "clip", PlayerConfig::default());
    media.load_metadata(30.0, None);
    start_playing(&mut event_loop, id, &media);
    event_loop.player_mut(id).unwrap().hide_controls(false);
    assert!(!event_loop.player(id).unwrap().controls_visible());

    media.finish();
    event_loop.pump();
    assert_eq!(media.current_time(), 0.0);
    assert_eq!(event_loop.player(id).unwrap().visibility(), Visibility::FadingIn);
}

// =============================================================================
// Event Loop Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_run_loop_hides_after_mouse_enter_timeout() {
    let mut event_loop = EventLoop::new(PlayerContext::tokio());
    let node = add_video(&event_loop, "clip");
    let media = SimulatedMedia::native().into_shared();
    let id = event_loop.create_player(node, media.clone(), None).unwrap();
    start_playing(&mut event_loop, id, &media);
    let container = event_loop.player(id).unwrap().container().unwrap();

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        let enter = DomEvent::new(DomEventKind::MouseEnter, EventTarget::Node(container));
        let _ = tx.send(HostInput::Dom(enter));
        tokio::time::sleep(Duration::from_secs(3)).await;
        let _ = tx.send(HostInput::Shutdown);
    });

    event_loop.run(rx).await;
    assert_eq!(event_loop.player(id).unwrap().visibility(), Visibility::Hidden);
}
