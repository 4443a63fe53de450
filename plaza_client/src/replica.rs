//! Local replica of the server roster.
//!
//! The server owns the authoritative player table; each client mirrors it
//! here for rendering. The replica is possibly stale and never written back
//! to the server except through explicit `updatePlayer` events.

use std::collections::BTreeMap;

use plaza_shared::net::ServerEvent;
use plaza_shared::player::{Player, PlayerId, PlayerPatch};

/// Render-side mirror of the roster.
#[derive(Debug, Default, Clone)]
pub struct Replica {
    players: BTreeMap<PlayerId, Player>,
}

impl Replica {
    /// Seeds the replica from an init snapshot.
    pub fn from_snapshot(players: BTreeMap<PlayerId, Player>) -> Self {
        Self { players }
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> &BTreeMap<PlayerId, Player> {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Folds one relay event into the replica.
    pub fn apply_event(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::Init(init) => {
                self.players = init.players.clone();
            }
            ServerEvent::NewPlayer(player) => {
                self.players.insert(player.id, player.clone());
            }
            ServerEvent::PlayerUpdated(state) => {
                if let Some(player) = self.players.get_mut(&state.player_id) {
                    player.position = state.position;
                    player.rotation = state.rotation;
                    player.move_dir = state.move_dir;
                    player.expression = state.expression;
                }
            }
            ServerEvent::PlayerDisconnected(id) => {
                self.players.remove(id);
            }
            ServerEvent::ServerFull(_) => {}
        }
    }

    /// Applies a locally initiated patch to one record (the server does not
    /// echo a client's own updates back).
    pub fn apply_patch(&mut self, id: PlayerId, patch: &PlayerPatch) {
        if let Some(player) = self.players.get_mut(&id) {
            player.apply(patch);
        }
    }
}
