//! Configuration system.
//!
//! Loads relay configuration from JSON strings/files (file IO left to app).

use serde::{Deserialize, Serialize};

/// Default cap on concurrently connected players.
pub const MAX_PLAYERS: usize = 16;

/// Radius of the spawn circle, in world units.
pub const SPAWN_RADIUS: f32 = 7.0;

/// What to do with a client whose outbound queue overflows.
///
/// Broadcasts are not retried; a slow consumer either loses the oldest
/// queued events or the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Skip the oldest queued events and keep the connection.
    #[default]
    DropOldest,
    /// Close the connection.
    Disconnect,
}

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Server listen address, e.g. `127.0.0.1:4000`.
    pub listen_addr: String,
    /// Maximum concurrently connected players.
    #[serde(default = "default_max_players")]
    pub max_players: usize,
    /// Spawn circle radius.
    #[serde(default = "default_spawn_radius")]
    pub spawn_radius: f32,
    /// Per-client outbound queue depth, in events.
    #[serde(default = "default_outbound_depth")]
    pub outbound_depth: usize,
    /// Policy applied when a client's outbound queue overflows.
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
}

fn default_max_players() -> usize {
    MAX_PLAYERS
}

fn default_spawn_radius() -> f32 {
    SPAWN_RADIUS
}

fn default_outbound_depth() -> usize {
    64
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:4000".to_string(),
            max_players: default_max_players(),
            spawn_radius: default_spawn_radius(),
            outbound_depth: default_outbound_depth(),
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl RelayConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
