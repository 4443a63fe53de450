//! Player roster.
//!
//! Sole source of truth for player existence and state. The dispatch loop
//! owns the roster and mutates it serially; nothing else touches it, so no
//! locking is needed and no two admissions can race an id or the capacity
//! check.
//!
//! Determinism notes:
//! - Ids come from a process-lifetime counter starting at 1, never reused.
//! - Spawn placement is a pure function of the id.
//! - `BTreeMap` keeps snapshot iteration order stable.

use std::collections::BTreeMap;
use std::f32::consts::TAU;
use std::fmt;

use plaza_shared::math::Vec3;
use plaza_shared::player::{Expression, MoveIntent, Player, PlayerId, PlayerPatch};

/// Admission failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitError {
    /// The roster is at capacity.
    ServerFull,
}

impl fmt::Display for AdmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmitError::ServerFull => write!(f, "Server is full"),
        }
    }
}

impl std::error::Error for AdmitError {}

/// Update failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    /// The id is not currently registered (e.g. the update raced a
    /// disconnect). Non-fatal for callers.
    UnknownPlayer,
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateError::UnknownPlayer => write!(f, "unknown player"),
        }
    }
}

impl std::error::Error for UpdateError {}

/// In-memory table of registered players.
pub struct Roster {
    players: BTreeMap<PlayerId, Player>,
    next_id: PlayerId,
    max_players: usize,
    spawn_radius: f32,
}

impl Roster {
    pub fn new(max_players: usize, spawn_radius: f32) -> Self {
        Self {
            players: BTreeMap::new(),
            next_id: 1,
            max_players,
            spawn_radius,
        }
    }

    /// Admits a new player: capacity check, identity allocation, deterministic
    /// spawn placement. Returns a clone of the inserted record.
    pub fn admit(&mut self) -> Result<Player, AdmitError> {
        if self.players.len() >= self.max_players {
            return Err(AdmitError::ServerFull);
        }

        let id = self.next_id;
        self.next_id += 1;

        // Players spawn evenly around a circle, initially facing its center.
        let angle = (id - 1) as f32 / self.max_players as f32 * TAU;
        let x = self.spawn_radius * angle.cos();
        let z = self.spawn_radius * angle.sin();
        let yaw = (-x).atan2(z);

        let player = Player {
            id,
            position: Vec3::new(x, 0.0, z),
            rotation: Vec3::new(0.0, yaw, 0.0),
            move_dir: MoveIntent::default(),
            expression: Expression::default(),
        };
        self.players.insert(id, player.clone());
        Ok(player)
    }

    /// Applies the fields present in `patch` to the stored record.
    /// Returns a clone of the post-update record for rebroadcast.
    pub fn update(&mut self, id: PlayerId, patch: &PlayerPatch) -> Result<Player, UpdateError> {
        let player = self.players.get_mut(&id).ok_or(UpdateError::UnknownPlayer)?;
        player.apply(patch);
        Ok(player.clone())
    }

    /// Removes a player. Removing an unregistered id is a no-op.
    pub fn remove(&mut self, id: PlayerId) {
        self.players.remove(&id);
    }

    /// Read-only clone of all current players, for new-client initialization.
    pub fn snapshot(&self) -> BTreeMap<PlayerId, Player> {
        self.players.clone()
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_shared::config::{MAX_PLAYERS, SPAWN_RADIUS};

    const EPS: f32 = 1e-4;

    fn full_roster() -> Roster {
        let mut roster = Roster::new(MAX_PLAYERS, SPAWN_RADIUS);
        for _ in 0..MAX_PLAYERS {
            roster.admit().unwrap();
        }
        roster
    }

    #[test]
    fn admission_over_capacity_fails_and_leaves_roster_unchanged() {
        let mut roster = full_roster();
        let before = roster.snapshot();

        assert_eq!(roster.admit(), Err(AdmitError::ServerFull));
        assert_eq!(roster.snapshot(), before);
        assert_eq!(roster.len(), MAX_PLAYERS);
    }

    #[test]
    fn capacity_frees_up_after_removal() {
        let mut roster = full_roster();
        roster.remove(5);
        assert!(!roster.is_full());

        let player = roster.admit().unwrap();
        assert_eq!(roster.len(), MAX_PLAYERS);
        assert_eq!(player.id, MAX_PLAYERS as PlayerId + 1);
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut roster = Roster::new(4, SPAWN_RADIUS);
        let a = roster.admit().unwrap().id;
        let b = roster.admit().unwrap().id;
        assert_eq!((a, b), (1, 2));

        roster.remove(a);
        let c = roster.admit().unwrap().id;
        assert_eq!(c, 3);
        assert!(roster.get(a).is_none());
    }

    #[test]
    fn spawns_sit_on_the_circle_facing_center() {
        let mut roster = Roster::new(MAX_PLAYERS, SPAWN_RADIUS);
        for k in 1..=MAX_PLAYERS {
            let player = roster.admit().unwrap();
            let angle = (k - 1) as f32 / MAX_PLAYERS as f32 * TAU;
            let x = SPAWN_RADIUS * angle.cos();
            let z = SPAWN_RADIUS * angle.sin();

            assert!((player.position.x - x).abs() < EPS, "player {k} x");
            assert_eq!(player.position.y, 0.0);
            assert!((player.position.z - z).abs() < EPS, "player {k} z");
            assert!((player.rotation.y - (-x).atan2(z)).abs() < EPS, "player {k} yaw");
            assert_eq!(player.rotation.x, 0.0);
            assert_eq!(player.rotation.z, 0.0);
        }
    }

    #[test]
    fn first_spawn_is_on_positive_x_axis() {
        let mut roster = Roster::new(MAX_PLAYERS, SPAWN_RADIUS);
        let player = roster.admit().unwrap();
        assert!((player.position.x - SPAWN_RADIUS).abs() < EPS);
        assert!(player.position.z.abs() < EPS);
        assert_eq!(player.move_dir, MoveIntent::default());
        assert_eq!(player.expression, Expression::Neutral);
    }

    #[test]
    fn update_touches_only_present_fields() {
        let mut roster = Roster::new(4, SPAWN_RADIUS);
        let id = roster.admit().unwrap().id;
        roster
            .update(
                id,
                &PlayerPatch::new().with_position(Vec3::new(1.0, 2.0, 3.0)),
            )
            .unwrap();

        let updated = roster
            .update(id, &PlayerPatch::new().with_expression(Expression::Wave))
            .unwrap();

        assert_eq!(updated.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(updated.expression, Expression::Wave);
    }

    #[test]
    fn update_of_unknown_id_fails() {
        let mut roster = Roster::new(4, SPAWN_RADIUS);
        let result = roster.update(42, &PlayerPatch::new().with_expression(Expression::Wave));
        assert_eq!(result, Err(UpdateError::UnknownPlayer));
        assert!(roster.is_empty());
    }

    #[test]
    fn remove_is_idempotent_and_drops_from_snapshot() {
        let mut roster = Roster::new(4, SPAWN_RADIUS);
        let id = roster.admit().unwrap().id;
        roster.admit().unwrap();

        roster.remove(id);
        roster.remove(id);

        assert_eq!(roster.len(), 1);
        assert!(!roster.snapshot().contains_key(&id));
    }
}
