//! Relay server implementation.
//!
//! Event flow:
//! - The dispatch loop in [`RelayServer::run`] is the only task that touches
//!   the roster and the client table. Connection events from every reader
//!   task funnel into it over one mpsc channel, so all admissions, updates,
//!   and removals are applied serially in arrival order.
//! - Broadcasts are encoded once and fanned out over a single
//!   `tokio::sync::broadcast` channel of `(origin, payload)` pairs. Each
//!   writer task filters out frames originating from its own player, which
//!   is what keeps updates from echoing back to their sender.
//! - The broadcast channel is bounded by `outbound_depth`; a writer that
//!   lags behind either skips the oldest frames or loses the connection,
//!   per `overflow_policy`.

use std::collections::HashMap;
use std::net::SocketAddr;

use anyhow::Context;
use bytes::Bytes;
use plaza_shared::config::{OverflowPolicy, RelayConfig};
use plaza_shared::net::{
    decode_from_bytes, encode_to_bytes, ClientEvent, Connection, EventReader, EventWriter,
    InitData, Listener, PlayerState, ServerEvent,
};
use plaza_shared::player::{PlayerId, PlayerPatch};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::roster::{Roster, UpdateError};

/// Connection event handed to the dispatch loop by a reader task.
#[derive(Debug)]
enum ConnEvent {
    /// The client sent `updatePlayer`.
    Update(PlayerId, PlayerPatch),
    /// The transport closed (or failed) for this connection.
    Closed(PlayerId),
}

/// Dispatcher-side handle to one connected client.
struct ClientHandle {
    /// Targeted outbound path; dropping it stops the writer task.
    _direct: mpsc::Sender<Bytes>,
    addr: SocketAddr,
}

/// Relay server: admits connections, applies updates, fans out state.
pub struct RelayServer {
    cfg: RelayConfig,
    roster: Roster,
    listener: Listener,
    clients: HashMap<PlayerId, ClientHandle>,
    events_tx: mpsc::Sender<ConnEvent>,
    events_rx: mpsc::Receiver<ConnEvent>,
    fanout: broadcast::Sender<(PlayerId, Bytes)>,
}

impl RelayServer {
    /// Binds the listen socket and sets up the dispatch channels.
    pub async fn bind(cfg: RelayConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.listen_addr.parse().context("parse listen_addr")?;
        let listener = Listener::bind(addr).await?;

        let (events_tx, events_rx) = mpsc::channel(256);
        let (fanout, _) = broadcast::channel(cfg.outbound_depth.max(1));

        Ok(Self {
            roster: Roster::new(cfg.max_players, cfg.spawn_radius),
            cfg,
            listener,
            clients: HashMap::new(),
            events_tx,
            events_rx,
            fanout,
        })
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept/dispatch loop until the process exits.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(max_players = self.cfg.max_players, "Relay running");
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((conn, peer)) => self.handle_connect(conn, peer)?,
                    // One bad accept must not take the relay down.
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
                Some(event) = self.events_rx.recv() => match event {
                    ConnEvent::Update(id, patch) => self.handle_update(id, patch)?,
                    ConnEvent::Closed(id) => self.handle_disconnect(id)?,
                },
            }
        }
    }

    fn handle_connect(&mut self, conn: Connection, peer: SocketAddr) -> anyhow::Result<()> {
        let player = match self.roster.admit() {
            Ok(player) => player,
            Err(e) => {
                info!(%peer, "Connection rejected: server full");
                // Deliver the rejection notice off the dispatch task, then
                // drop the connection. It is never registered.
                tokio::spawn(async move {
                    let mut conn = conn;
                    let _ = conn.send(&ServerEvent::ServerFull(e.to_string())).await;
                });
                return Ok(());
            }
        };

        let id = player.id;
        let init = encode_to_bytes(&ServerEvent::Init(InitData {
            player_id: id,
            players: self.roster.snapshot(),
        }))?;

        // Subscribe before the newPlayer broadcast below so this writer sees
        // every event that follows its snapshot, and nothing before it.
        let fanout_rx = self.fanout.subscribe();
        let (direct_tx, direct_rx) = mpsc::channel(8);
        let (reader, writer) = conn.into_split();

        tokio::spawn(write_loop(
            id,
            init,
            direct_rx,
            fanout_rx,
            writer,
            self.cfg.overflow_policy,
        ));
        tokio::spawn(read_loop(id, reader, self.events_tx.clone()));

        self.clients.insert(
            id,
            ClientHandle {
                _direct: direct_tx,
                addr: peer,
            },
        );

        info!(player_id = id, %peer, players = self.roster.len(), "Player connected");
        self.broadcast_from(id, &ServerEvent::NewPlayer(player))
    }

    fn handle_update(&mut self, id: PlayerId, patch: PlayerPatch) -> anyhow::Result<()> {
        match self.roster.update(id, &patch) {
            Ok(player) => {
                self.broadcast_from(id, &ServerEvent::PlayerUpdated(PlayerState::from(&player)))
            }
            // The update raced a disconnect; drop it without a broadcast.
            Err(UpdateError::UnknownPlayer) => {
                debug!(player_id = id, "Dropped update for unregistered player");
                Ok(())
            }
        }
    }

    fn handle_disconnect(&mut self, id: PlayerId) -> anyhow::Result<()> {
        // Closure can be reported more than once; only the first counts.
        let Some(handle) = self.clients.remove(&id) else {
            return Ok(());
        };

        self.roster.remove(id);
        info!(player_id = id, peer = %handle.addr, players = self.roster.len(), "Player disconnected");
        self.broadcast_from(id, &ServerEvent::PlayerDisconnected(id))
    }

    /// Encodes `event` once and fans it out to every client except `origin`.
    fn broadcast_from(&self, origin: PlayerId, event: &ServerEvent) -> anyhow::Result<()> {
        let payload = encode_to_bytes(event)?;
        // Send fails only when no writer is subscribed, i.e. the last
        // client is leaving.
        let _ = self.fanout.send((origin, payload));
        Ok(())
    }
}

/// Reads client events off one connection and forwards them to dispatch.
async fn read_loop(id: PlayerId, mut reader: EventReader, events: mpsc::Sender<ConnEvent>) {
    loop {
        match reader.recv_frame().await {
            Ok(frame) => match decode_from_bytes::<ClientEvent>(&frame) {
                Ok(ClientEvent::UpdatePlayer(patch)) => {
                    if events.send(ConnEvent::Update(id, patch)).await.is_err() {
                        return;
                    }
                }
                // A frame we cannot decode is skipped, not fatal.
                Err(e) => debug!(player_id = id, error = %e, "Ignoring undecodable frame"),
            },
            Err(e) => {
                debug!(player_id = id, error = %e, "Connection closed");
                let _ = events.send(ConnEvent::Closed(id)).await;
                return;
            }
        }
    }
}

/// Writes the init snapshot, then relays targeted and broadcast frames until
/// the connection ends or dispatch drops the direct handle.
async fn write_loop(
    id: PlayerId,
    init: Bytes,
    mut direct: mpsc::Receiver<Bytes>,
    mut fanout: broadcast::Receiver<(PlayerId, Bytes)>,
    mut writer: EventWriter,
    policy: OverflowPolicy,
) {
    if writer.send_frame(&init).await.is_err() {
        return;
    }
    loop {
        tokio::select! {
            targeted = direct.recv() => match targeted {
                Some(payload) => {
                    if writer.send_frame(&payload).await.is_err() {
                        return;
                    }
                }
                // Dispatch removed this client.
                None => return,
            },
            relayed = fanout.recv() => match relayed {
                Ok((origin, payload)) => {
                    if origin == id {
                        continue;
                    }
                    if writer.send_frame(&payload).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => match policy {
                    OverflowPolicy::DropOldest => {
                        warn!(player_id = id, skipped, "Slow client, dropped oldest events");
                    }
                    OverflowPolicy::Disconnect => {
                        warn!(player_id = id, skipped, "Slow client, disconnecting");
                        return;
                    }
                },
                Err(broadcast::error::RecvError::Closed) => return,
            },
        }
    }
}
