//! Live player registry
//!
//! Shared by every player created against the same host. It allocates ids
//! and coordinates "pause other players" on play.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::dom::NodeId;
use crate::media::SharedMedia;
use crate::types::PlayerId;

/// What the registry knows about a player
#[derive(Clone)]
pub struct RegistryEntry {
    pub media: SharedMedia,
    /// Input focus flag, shared with the player
    pub focus: Rc<Cell<bool>>,
    pub pause_other_players: bool,
    pub container: Option<NodeId>,
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("focus", &self.focus.get())
            .field("pause_other_players", &self.pause_other_players)
            .field("container", &self.container)
            .finish()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_index: u64,
    entries: BTreeMap<PlayerId, RegistryEntry>,
}

/// Cloneable handle to the registry
#[derive(Debug, Clone, Default)]
pub struct PlayerRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id in the `mep_N` sequence
    pub fn allocate_id(&self) -> PlayerId {
        let mut inner = self.inner.borrow_mut();
        let id = PlayerId(inner.next_index);
        inner.next_index += 1;
        id
    }

    pub fn insert(&self, id: PlayerId, entry: RegistryEntry) {
        self.inner.borrow_mut().entries.insert(id, entry);
    }

    pub fn remove(&self, id: PlayerId) -> bool {
        self.inner.borrow_mut().entries.remove(&id).is_some()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.inner.borrow().entries.contains_key(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<RegistryEntry> {
        self.inner.borrow().entries.get(&id).cloned()
    }

    pub fn set_container(&self, id: PlayerId, container: NodeId) {
        if let Some(entry) = self.inner.borrow_mut().entries.get_mut(&id) {
            entry.container = Some(container);
        }
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.inner.borrow().entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// When `initiator` opted in, pause every other player that is neither
    /// paused nor ended, clearing its focus. Returns the players that were paused.
    pub fn pause_others(&self, initiator: PlayerId) -> Vec<PlayerId> {
        let candidates: Vec<(PlayerId, RegistryEntry)> = {
            let inner = self.inner.borrow();
            let opted_in = inner
                .entries
                .get(&initiator)
                .is_some_and(|entry| entry.pause_other_players);
            if !opted_in {
                return Vec::new();
            }
            inner
                .entries
                .iter()
                .filter(|(id, _)| **id != initiator)
                .map(|(id, entry)| (*id, entry.clone()))
                .collect()
        };

        let mut paused = Vec::new();
        for (id, entry) in candidates {
            if entry.media.paused() || entry.media.ended() {
                continue;
            }
            entry.media.pause();
            entry.focus.set(false);
            debug!(player = %id, initiator = %initiator, "Paused by another player");
            paused.push(id);
        }
        paused
    }
}
