//! CLI command implementations

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use kino_chrome::geometry::{self, ResponsiveInput, Size};
use kino_chrome::keyboard::default_key_actions;
use kino_chrome::{
    Dimension, DomEvent, DomEventKind, EventLoop, EventTarget, HostInput, MediaElement, PlayerConfig,
    PlayerContext, PlayerEvent, ReadyState, SimulatedMedia,
};
use serde::Serialize;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::output::{print_json, OutputFormat};

#[derive(Debug, Serialize)]
struct LayoutReport {
    mode: String,
    width: f64,
    height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    margin_left: Option<f64>,
}

/// Compute a fill or responsive layout
pub fn layout(
    mode: &str,
    width: f64,
    height: f64,
    parent_width: f64,
    parent_height: f64,
    format: &str,
) -> anyhow::Result<()> {
    let report = match mode {
        "fill" => {
            let fill = geometry::fill_layout(Size::new(width, height), Size::new(parent_width, parent_height));
            LayoutReport {
                mode: mode.to_string(),
                width: fill.width,
                height: fill.height,
                margin_left: Some(fill.margin_left),
            }
        }
        "responsive" => {
            let defaults = PlayerConfig::default();
            let input = ResponsiveInput {
                is_video: true,
                width: Dimension::Px(width),
                height: Dimension::Px(height),
                video_size: Some((width, height)),
                attribute_size: (None, None),
                default_video: (defaults.default_video_width, defaults.default_video_height),
                default_audio: (defaults.default_audio_width, defaults.default_audio_height),
                initial_aspect_ratio: geometry::orientation_ratio(width, height),
                parent: (parent_width, parent_height),
                viewport: None,
            };
            let size = geometry::responsive_size(&input)
                .with_context(|| format!("no positive size fits a {}x{} parent", parent_width, parent_height))?;
            LayoutReport {
                mode: mode.to_string(),
                width: size.width,
                height: size.height,
                margin_left: None,
            }
        }
        other => bail!("unknown layout mode '{}' (expected fill or responsive)", other),
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            println!("Layout ({}):", report.mode);
            println!("  Width: {}", Dimension::Px(report.width));
            println!("  Height: {}", Dimension::Px(report.height));
            if let Some(margin) = report.margin_left {
                println!("  Margin left: {}px", margin as i64);
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct KeyRow {
    action: &'static str,
    keys: Vec<u32>,
}

/// List the built-in key table
pub fn keys(format: &str) -> anyhow::Result<()> {
    let rows: Vec<KeyRow> = default_key_actions()
        .iter()
        .map(|a| KeyRow {
            action: a.action.name(),
            keys: a.keys.clone(),
        })
        .collect();

    match OutputFormat::from(format) {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Text => {
            println!("Keyboard actions:");
            for row in &rows {
                let keys: Vec<String> = row.keys.iter().map(u32::to_string).collect();
                println!("  {:<18} {}", row.action, keys.join(", "));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ConfigSummary {
    features: Vec<String>,
    stretching: String,
    time_format: String,
    class_prefix: String,
    always_show_controls: bool,
    enable_keyboard: bool,
    pause_other_players: bool,
    controls_timeout_ms: u64,
    key_actions: usize,
}

fn read_config(path: &Path) -> anyhow::Result<PlayerConfig> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    PlayerConfig::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

/// Parse an options file and print the resolved values
pub fn config(path: &Path, format: &str) -> anyhow::Result<()> {
    let config = read_config(path)?;
    let summary = ConfigSummary {
        features: config.features.clone(),
        stretching: format!("{:?}", config.stretching).to_lowercase(),
        time_format: config.effective_time_format(),
        class_prefix: config.class_prefix.clone(),
        always_show_controls: config.always_show_controls,
        enable_keyboard: config.enable_keyboard,
        pause_other_players: config.pause_other_players,
        controls_timeout_ms: config.controls_timeout_default,
        key_actions: config.key_actions.len(),
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            println!("Options: {}", path.display());
            println!("  Features: {}", summary.features.join(", "));
            println!("  Stretching: {}", summary.stretching);
            println!("  Time format: {}", summary.time_format);
            println!("  Class prefix: {}", summary.class_prefix);
            println!("  Always show controls: {}", summary.always_show_controls);
            println!("  Keyboard: {} ({} actions)", summary.enable_keyboard, summary.key_actions);
            println!("  Pause other players: {}", summary.pause_other_players);
            println!("  Controls timeout: {}ms", summary.controls_timeout_ms);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct SessionReport {
    player: String,
    state: String,
    controls_visible: bool,
    current_time: f64,
    notifications: Vec<String>,
}

/// Play a simulated clip, hover the player, then leave it alone for
/// `run_ms` so the auto-hide runs through the event loop
pub async fn simulate(config: Option<PathBuf>, duration: f64, run_ms: u64, format: &str) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => Some(read_config(&path)?),
        None => None,
    };

    let mut event_loop = EventLoop::new(PlayerContext::tokio());
    {
        let mut doc = event_loop.document().borrow_mut();
        let body = doc.body();
        let video = doc.create_child(body, "video", "");
        doc.set_attr(video, "id", "simulated");
    }
    let media = SimulatedMedia::native().into_shared();
    let id = event_loop.create_player_by_id("simulated", media.clone(), config)?;
    let mut events = event_loop
        .player(id)
        .context("player missing after creation")?
        .subscribe();

    media.load_metadata(duration, Some((640.0, 360.0)));
    media.set_ready_state(ReadyState::HaveEnoughData);
    event_loop.pump();
    if let Some(player) = event_loop.player_mut(id) {
        player.play();
    }
    event_loop.pump();

    let container = event_loop
        .player(id)
        .and_then(|p| p.container())
        .context("player has no chrome")?;

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let enter = DomEvent::new(DomEventKind::MouseEnter, EventTarget::Node(container));
        let _ = tx.send(HostInput::Dom(enter));
        tokio::time::sleep(Duration::from_millis(run_ms)).await;
        let _ = tx.send(HostInput::Shutdown);
    });

    info!(player = %id, run_ms, "Running simulated session");
    event_loop.run(rx).await;

    let mut notifications = Vec::new();
    loop {
        match events.try_recv() {
            Ok(PlayerEvent { kind, .. }) => notifications.push(kind.event_name().to_string()),
            Err(TryRecvError::Lagged(skipped)) => debug!(skipped, "Notification receiver lagged"),
            Err(_) => break,
        }
    }

    let player = event_loop.player(id).context("player missing after run")?;
    let report = SessionReport {
        player: id.to_string(),
        state: player.state().to_string(),
        controls_visible: player.controls_visible(),
        current_time: media.current_time(),
        notifications,
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            println!("Session {}:", report.player);
            println!("  State: {}", report.state);
            println!("  Controls visible: {}", report.controls_visible);
            println!("  Current time: {:.2}s", report.current_time);
            println!("  Notifications:");
            for name in &report.notifications {
                println!("    {}", name);
            }
        }
    }

    event_loop.remove_player(id)?;
    Ok(())
}
