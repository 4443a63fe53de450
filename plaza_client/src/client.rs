//! Client implementation.
//!
//! The client maintains:
//! - One framed TCP connection to the relay
//! - Its assigned player id
//! - A local [`Replica`] of the roster, folded from relay events
//!
//! Admission is implicit: the first event on a fresh connection is either
//! `init` (admitted) or `serverFull` followed by a close (rejected).

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use plaza_shared::net::{ClientEvent, Connection, ServerEvent};
use plaza_shared::player::{Player, PlayerId, PlayerPatch};
use tracing::{debug, info};

use crate::replica::Replica;

/// Admission was denied; carries the server's reason text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected(pub String);

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rejected by server: {}", self.0)
    }
}

impl std::error::Error for Rejected {}

/// High-level relay client.
#[derive(Debug)]
pub struct RelayClient {
    pub player_id: PlayerId,
    conn: Connection,
    replica: Replica,
}

impl RelayClient {
    /// Connects to the relay and waits for admission.
    ///
    /// Returns a [`Rejected`] error (downcastable through `anyhow`) when the
    /// server is full.
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        info!(server = %addr, "Connecting to relay");
        let mut conn = Connection::connect(addr).await?;

        let first: ServerEvent = conn.recv().await.context("await admission")?;
        match first {
            ServerEvent::Init(init) => {
                info!(player_id = init.player_id, players = init.players.len(), "Admitted");
                Ok(Self {
                    player_id: init.player_id,
                    conn,
                    replica: Replica::from_snapshot(init.players),
                })
            }
            ServerEvent::ServerFull(reason) => Err(Rejected(reason).into()),
            other => anyhow::bail!("expected init, got {other:?}"),
        }
    }

    /// The local replica of the roster.
    pub fn replica(&self) -> &Replica {
        &self.replica
    }

    /// The client's own record, as currently replicated.
    pub fn me(&self) -> Option<&Player> {
        self.replica.get(self.player_id)
    }

    /// Sends a partial update of the own record and mirrors it locally
    /// (the relay does not echo updates back to their sender).
    pub async fn send_update(&mut self, patch: &PlayerPatch) -> anyhow::Result<()> {
        self.conn
            .send(&ClientEvent::UpdatePlayer(patch.clone()))
            .await?;
        self.replica.apply_patch(self.player_id, patch);
        Ok(())
    }

    /// Waits up to `timeout` for one relay event, folding it into the
    /// replica before returning it.
    pub async fn poll_event(&mut self, timeout: Duration) -> anyhow::Result<Option<ServerEvent>> {
        let Some(event) = self.conn.recv_timeout::<ServerEvent>(timeout).await? else {
            return Ok(None);
        };
        debug!(?event, "Relay event");
        self.replica.apply_event(&event);
        Ok(Some(event))
    }
}
