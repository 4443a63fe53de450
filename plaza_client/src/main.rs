//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p plaza_client -- [--addr 127.0.0.1:4000] [--hz 20]
//!
//! A headless stand-in for the rendering front-end: connects to the relay,
//! walks forward while periodically waving, and logs roster changes.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use plaza_client::RelayClient;
use plaza_shared::math::Vec3;
use plaza_shared::net::ServerEvent;
use plaza_shared::player::{Expression, MoveIntent, PlayerPatch};
use tracing::info;

struct Args {
    addr: String,
    hz: u32,
}

fn parse_args() -> Args {
    let mut parsed = Args {
        addr: "127.0.0.1:4000".to_string(),
        hz: 20,
    };
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                parsed.addr = args[i + 1].clone();
                i += 2;
            }
            "--hz" if i + 1 < args.len() => {
                parsed.hz = args[i + 1].parse().unwrap_or(parsed.hz);
                i += 2;
            }
            _ => i += 1,
        }
    }
    parsed
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args();
    let addr: SocketAddr = args.addr.parse().context("parse --addr")?;

    let mut client = RelayClient::connect(addr).await.context("connect")?;
    info!(player_id = client.player_id, "Connected");

    let tick = Duration::from_secs_f32(1.0 / args.hz.max(1) as f32);
    let mut ticks: u64 = 0;

    loop {
        // Walk forward; wave for a second out of every four.
        let waving = ticks % (args.hz as u64 * 4) < args.hz as u64;
        let me = client.me().context("own record missing")?;
        let yaw = me.rotation.y;
        let step = 0.05;
        let position = Vec3::new(
            me.position.x - yaw.sin() * step,
            me.position.y,
            me.position.z - yaw.cos() * step,
        );

        let patch = PlayerPatch::new()
            .with_position(position)
            .with_move_dir(MoveIntent::new(1.0, 0.0))
            .with_expression(if waving {
                Expression::Wave
            } else {
                Expression::Neutral
            });
        client.send_update(&patch).await?;

        while let Some(event) = client.poll_event(Duration::from_millis(1)).await? {
            match event {
                ServerEvent::NewPlayer(p) => {
                    info!(player_id = p.id, players = client.replica().len(), "Player joined")
                }
                ServerEvent::PlayerDisconnected(id) => {
                    info!(player_id = id, players = client.replica().len(), "Player left")
                }
                _ => {}
            }
        }

        ticks += 1;
        tokio::time::sleep(tick).await;
    }
}
