//! Player state model.
//!
//! One `Player` record per connected client. The server's roster owns the
//! authoritative copy; clients hold a render-side replica fed by relay
//! events. Records are fully populated from admission until removal.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Identifies a player for the lifetime of the server process.
///
/// Assigned from a monotonic counter starting at 1; never reused, even after
/// the owner disconnects.
pub type PlayerId = u32;

/// Requested movement axes, not velocity. Conceptually in `[-1, 1]` each;
/// the relay does not clamp (it trusts client-submitted state).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MoveIntent {
    #[serde(rename = "f")]
    pub forward: f32,
    #[serde(rename = "r")]
    pub right: f32,
}

impl MoveIntent {
    pub const fn new(forward: f32, right: f32) -> Self {
        Self { forward, right }
    }
}

/// Character expression, driven directly by client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    #[default]
    Neutral,
    Wave,
}

/// Full state of one player.
///
/// `rotation` is pitch/yaw/roll in radians; roll stays 0 in practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub position: Vec3,
    pub rotation: Vec3,
    pub move_dir: MoveIntent,
    pub expression: Expression,
}

impl Player {
    /// Applies the fields present in `patch`, last-write-wins per field.
    /// Absent fields keep their current value.
    pub fn apply(&mut self, patch: &PlayerPatch) {
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        if let Some(move_dir) = patch.move_dir {
            self.move_dir = move_dir;
        }
        if let Some(expression) = patch.expression {
            self.expression = expression;
        }
    }
}

/// Partial player update: any subset of the mutable fields.
///
/// Absent fields deserialize to `None` and leave the stored value untouched;
/// unknown fields in an incoming message are ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_dir: Option<MoveIntent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,
}

impl PlayerPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn with_move_dir(mut self, move_dir: MoveIntent) -> Self {
        self.move_dir = Some(move_dir);
        self
    }

    pub fn with_expression(mut self, expression: Expression) -> Self {
        self.expression = Some(expression);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_player() -> Player {
        Player {
            id: 1,
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(0.0, 0.5, 0.0),
            move_dir: MoveIntent::default(),
            expression: Expression::Neutral,
        }
    }

    #[test]
    fn apply_overwrites_only_present_fields() {
        let mut player = sample_player();
        player.apply(&PlayerPatch::new().with_expression(Expression::Wave));

        assert_eq!(player.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(player.rotation, Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(player.expression, Expression::Wave);
    }

    #[test]
    fn apply_empty_patch_is_noop() {
        let mut player = sample_player();
        let before = player.clone();
        player.apply(&PlayerPatch::new());
        assert_eq!(player, before);
    }

    #[test]
    fn patch_tolerates_absent_and_unknown_fields() {
        let patch: PlayerPatch =
            serde_json::from_str(r#"{"expression":"wave","sprinting":true}"#).unwrap();
        assert_eq!(patch.expression, Some(Expression::Wave));
        assert_eq!(patch.position, None);
        assert_eq!(patch.move_dir, None);
    }

    #[test]
    fn move_dir_uses_short_axis_names() {
        let json = serde_json::to_string(&MoveIntent::new(1.0, -0.5)).unwrap();
        assert_eq!(json, r#"{"f":1.0,"r":-0.5}"#);
    }
}
