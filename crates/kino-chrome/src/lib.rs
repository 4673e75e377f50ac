//! Kino Chrome - Player Chrome for Kino
//!
//! This crate wraps a media element with a player surface:
//! - Container, layers and control bar built around the media node
//! - Pluggable features (play/pause, progress, volume, fullscreen, ...)
//! - Controls visibility with fades, auto-hide timers and focus guards
//! - Fill, responsive and literal sizing
//! - Keyboard shortcuts and multi-player coordination
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Kino Chrome                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │   Document   │  │    Media     │  │    Timer     │           │
//! │  │    (dom)     │  │   Element    │  │    Queue     │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │   Player    │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │   Feature    │  │    Event    │  │   Player     │            │
//! │  │   Registry   │  │    Loop     │  │   Registry   │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on one thread. Media and DOM events are queued and
//! delivered by the [`EventLoop`], never re-entrantly.

pub mod command;
pub mod config;
pub mod dom;
pub mod error;
pub mod features;
pub mod geometry;
pub mod keyboard;
pub mod media;
pub mod player;
pub mod registry;
pub mod runtime;
pub mod timefmt;
pub mod timer;
pub mod types;
pub mod visibility;

pub use command::{CommandQueue, PlayerCommand};
pub use config::{Callback, CallbackArgs, CallbackTable, PlayerConfig, SeekInterval};
pub use dom::{Document, DomEvent, DomEventKind, EventTarget, ListenerId, Modifiers, NodeId, SharedDocument};
pub use error::{Error, Result};
pub use features::{Feature, FeatureContext, FeatureRegistry};
pub use keyboard::{KeyAction, KeyCommand, KeyContext};
pub use media::{MediaElement, MediaError, MediaEvent, SharedMedia, SimulatedMedia};
pub use player::{Player, PlayerContext};
pub use registry::PlayerRegistry;
pub use runtime::{EventLoop, HostInput};
pub use timer::{Clock, ManualClock, SharedClock, TokioClock};
pub use types::*;
pub use visibility::Visibility;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the chrome library
pub fn init() {
    tracing::info!(version = VERSION, "Kino Chrome initialized");
}
