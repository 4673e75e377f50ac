//! Host event loop
//!
//! Owns every player on a page, routes host DOM events to the listeners
//! that match, drains queued media events and fires timers when their
//! deadlines pass.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::PlayerConfig;
use crate::dom::{DomEvent, NodeId, SharedDocument};
use crate::media::SharedMedia;
use crate::player::{Player, PlayerContext};
use crate::types::PlayerId;
use crate::{Error, Result};

/// Upper bound on media pump rounds per dispatch
const MAX_PUMP_ROUNDS: usize = 32;

/// Input a host feeds into [`EventLoop::run`]
#[derive(Debug, Clone)]
pub enum HostInput {
    Dom(DomEvent),
    Shutdown,
}

#[derive(Debug)]
pub struct EventLoop {
    ctx: PlayerContext,
    players: BTreeMap<PlayerId, Player>,
}

impl EventLoop {
    pub fn new(ctx: PlayerContext) -> Self {
        Self {
            ctx,
            players: BTreeMap::new(),
        }
    }

    pub fn context(&self) -> &PlayerContext {
        &self.ctx
    }

    pub fn document(&self) -> &SharedDocument {
        &self.ctx.document
    }

    /// Wrap `node` and deliver whatever the media element has queued
    pub fn create_player(&mut self, node: NodeId, media: SharedMedia, config: Option<PlayerConfig>) -> Result<PlayerId> {
        let player = Player::new(self.ctx.clone(), node, media, config)?;
        let id = player.id();
        self.players.insert(id, player);
        self.pump();
        Ok(id)
    }

    /// [`create_player`](Self::create_player) for the element with `element_id`
    pub fn create_player_by_id(
        &mut self,
        element_id: &str,
        media: SharedMedia,
        config: Option<PlayerConfig>,
    ) -> Result<PlayerId> {
        let node = self
            .ctx
            .document
            .borrow()
            .element_by_id(element_id)
            .ok_or_else(|| Error::NodeNotFound(element_id.to_string()))?;
        self.create_player(node, media, config)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    /// Deliver a DOM event; returns how many listeners it reached
    pub fn dispatch(&mut self, event: DomEvent) -> usize {
        let matched = self.ctx.document.borrow().dispatch(&event);
        debug!(event = ?event.kind, listeners = matched.len(), "Dispatching DOM event");
        for (owner, listener) in &matched {
            if let Some(player) = self.players.get_mut(owner) {
                player.handle_dom_event(*listener, &event);
            }
        }
        self.pump();
        matched.len()
    }

    /// Drain media events until every element is quiet
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        for _ in 0..MAX_PUMP_ROUNDS {
            let mut quiet = true;
            for player in self.players.values_mut() {
                let events = player.media().take_events();
                if events.is_empty() {
                    continue;
                }
                quiet = false;
                for event in events {
                    player.handle_media_event(event);
                    delivered += 1;
                }
            }
            if quiet {
                return delivered;
            }
        }
        warn!(rounds = MAX_PUMP_ROUNDS, "Media events still pending after pump limit");
        delivered
    }

    /// Fire due timers across all players, then pump
    pub fn fire_due_timers(&mut self) -> usize {
        let fired: usize = self.players.values_mut().map(Player::fire_due_timers).sum();
        if fired > 0 {
            self.pump();
        }
        fired
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.players.values().filter_map(Player::next_deadline).min()
    }

    /// Tear down a player and return the restored media node
    pub fn remove_player(&mut self, id: PlayerId) -> Result<NodeId> {
        let mut player = self.players.remove(&id).ok_or(Error::UnknownPlayer(id))?;
        player.remove()
    }

    /// Process host input and timers until [`HostInput::Shutdown`] or the
    /// sender is dropped
    pub async fn run(&mut self, mut inputs: mpsc::UnboundedReceiver<HostInput>) {
        info!(players = self.players.len(), "Event loop started");
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(HostInput::Dom(event)) => {
                        self.dispatch(event);
                    }
                    Some(HostInput::Shutdown) | None => break,
                },
                _ = async {
                    match deadline {
                        Some(deadline) => sleep_until(deadline).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    self.fire_due_timers();
                }
            }
        }
        info!("Event loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaElement, SimulatedMedia};

    fn page() -> (EventLoop, NodeId) {
        let (ctx, _clock) = PlayerContext::manual();
        let node = {
            let mut doc = ctx.document.borrow_mut();
            let body = doc.body();
            doc.create_child(body, "video", "")
        };
        (EventLoop::new(ctx), node)
    }

    #[test]
    fn test_create_player_pumps_ready() {
        let (mut event_loop, node) = page();
        let media = SimulatedMedia::native().into_shared();
        let id = event_loop.create_player(node, media.clone(), None).unwrap();
        assert!(event_loop.player(id).unwrap().is_created());
        assert_eq!(media.pending_events(), 0);
    }

    #[test]
    fn test_create_player_by_id() {
        let (mut event_loop, node) = page();
        event_loop.document().borrow_mut().set_attr(node, "id", "clip");

        let missing = event_loop.create_player_by_id("nope", SimulatedMedia::native().into_shared(), None);
        assert!(matches!(missing, Err(Error::NodeNotFound(ref id)) if id == "nope"));

        let id = event_loop
            .create_player_by_id("clip", SimulatedMedia::native().into_shared(), None)
            .unwrap();
        assert_eq!(event_loop.player(id).unwrap().node(), node);
    }

    #[test]
    fn test_remove_unknown_player() {
        let (mut event_loop, _node) = page();
        assert!(matches!(event_loop.remove_player(PlayerId(9)), Err(Error::UnknownPlayer(_))));
    }

    #[test]
    fn test_dispatch_click_toggles_playback() {
        let (mut event_loop, node) = page();
        let media = SimulatedMedia::native().into_shared();
        let shared: SharedMedia = media.clone();
        let id = event_loop.create_player(node, shared, None).unwrap();

        let reached = event_loop.dispatch(DomEvent::click(node));
        assert!(reached > 0);
        assert!(!media.paused());

        event_loop.dispatch(DomEvent::click(node));
        assert!(media.paused());

        let restored = event_loop.remove_player(id).unwrap();
        assert_ne!(restored, node);
        assert!(media.is_destroyed());
    }
}
