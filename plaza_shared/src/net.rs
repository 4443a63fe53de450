//! Wire protocol.
//!
//! Goals:
//! - One persistent bidirectional connection per client (TCP, length-prefixed
//!   JSON frames: u32 big-endian payload length, then the payload).
//! - Named events in both directions; the tag/content envelope keeps the
//!   protocol readable on the wire.
//! - Keep serialization explicit and versionable.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    time,
};

use crate::math::Vec3;
use crate::player::{Expression, MoveIntent, Player, PlayerId, PlayerPatch};

/// Events sent from the relay to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// First event after admission: the client's own id plus a snapshot of
    /// every currently registered player (itself included).
    Init(InitData),
    /// Admission denied; the connection is closed right after this event.
    ServerFull(String),
    /// Another player was admitted.
    NewPlayer(Player),
    /// Another player's state changed.
    PlayerUpdated(PlayerState),
    /// A player left; the id is gone from the roster.
    PlayerDisconnected(PlayerId),
}

/// Events sent from clients to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Partial update of the sender's own record.
    UpdatePlayer(PlayerPatch),
}

/// Payload of [`ServerEvent::Init`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitData {
    pub player_id: PlayerId,
    pub players: BTreeMap<PlayerId, Player>,
}

/// Full current state carried by [`ServerEvent::PlayerUpdated`].
///
/// Always the complete post-update values, even when the triggering update
/// touched a single field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub player_id: PlayerId,
    pub position: Vec3,
    pub rotation: Vec3,
    pub move_dir: MoveIntent,
    pub expression: Expression,
}

impl From<&Player> for PlayerState {
    fn from(p: &Player) -> Self {
        Self {
            player_id: p.id,
            position: p.position,
            rotation: p.rotation,
            move_dir: p.move_dir,
            expression: p.expression,
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> anyhow::Result<()> {
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(payload);
    writer.write_all(&buf).await.context("tcp write")?;
    Ok(())
}

async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> anyhow::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .context("tcp read len")?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    Ok(payload)
}

/// Message-framed connection over TCP.
///
/// Used whole by the client; the server splits it so reads and writes can
/// proceed concurrently.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        Ok(Self::new(stream))
    }

    pub async fn send<T: Serialize>(&mut self, msg: &T) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(msg).context("serialize msg")?;
        write_frame(&mut self.stream, &payload).await
    }

    pub async fn recv<T: DeserializeOwned>(&mut self) -> anyhow::Result<T> {
        let payload = read_frame(&mut self.stream).await?;
        let msg = serde_json::from_slice(&payload).context("deserialize msg")?;
        Ok(msg)
    }

    /// Receives a message within the given timeout.
    pub async fn recv_timeout<T: DeserializeOwned>(
        &mut self,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Option<T>> {
        match time::timeout(timeout, self.recv()).await {
            Ok(Ok(msg)) => Ok(Some(msg)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    /// Splits into independently owned read/write halves.
    pub fn into_split(self) -> (EventReader, EventWriter) {
        let (read, write) = self.stream.into_split();
        (EventReader { inner: read }, EventWriter { inner: write })
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }
}

/// Read half of a split [`Connection`].
#[derive(Debug)]
pub struct EventReader {
    inner: OwnedReadHalf,
}

impl EventReader {
    /// Reads one raw frame. Decoding is left to the caller so an undecodable
    /// frame can be skipped without tearing down the connection.
    pub async fn recv_frame(&mut self) -> anyhow::Result<Vec<u8>> {
        read_frame(&mut self.inner).await
    }
}

/// Write half of a split [`Connection`].
#[derive(Debug)]
pub struct EventWriter {
    inner: OwnedWriteHalf,
}

impl EventWriter {
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(msg).context("serialize msg")?;
        write_frame(&mut self.inner, &payload).await
    }

    /// Writes an already encoded payload. Broadcasts are encoded once and
    /// fanned out as shared bytes.
    pub async fn send_frame(&mut self, payload: &Bytes) -> anyhow::Result<()> {
        write_frame(&mut self.inner, payload).await
    }
}

/// TCP server listener.
pub struct Listener {
    listener: TcpListener,
}

impl Listener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(Connection, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((Connection::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes<T: Serialize>(msg: &T) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes<T: DeserializeOwned>(b: &[u8]) -> anyhow::Result<T> {
    serde_json::from_slice(b).context("deserialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_event_roundtrip_bytes() {
        let msg = ServerEvent::PlayerDisconnected(3);
        let bytes = encode_to_bytes(&msg).unwrap();
        let back: ServerEvent = decode_from_bytes(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn events_use_tagged_envelope() {
        let json = serde_json::to_string(&ServerEvent::ServerFull("Server is full".into())).unwrap();
        assert_eq!(json, r#"{"event":"serverFull","data":"Server is full"}"#);

        let json =
            serde_json::to_string(&ClientEvent::UpdatePlayer(PlayerPatch::new().with_move_dir(
                MoveIntent::new(1.0, 0.0),
            )))
            .unwrap();
        assert_eq!(
            json,
            r#"{"event":"updatePlayer","data":{"moveDir":{"f":1.0,"r":0.0}}}"#
        );
    }

    #[test]
    fn init_snapshot_keys_by_player_id() {
        let mut players = BTreeMap::new();
        players.insert(
            1,
            Player {
                id: 1,
                position: Vec3::new(7.0, 0.0, 0.0),
                rotation: Vec3::ZERO,
                move_dir: MoveIntent::default(),
                expression: Expression::Neutral,
            },
        );
        let init = ServerEvent::Init(InitData {
            player_id: 1,
            players,
        });

        let bytes = encode_to_bytes(&init).unwrap();
        let back: ServerEvent = decode_from_bytes(&bytes).unwrap();
        assert_eq!(init, back);
    }
}
