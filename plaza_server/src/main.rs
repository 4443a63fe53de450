//! Standalone relay binary.
//!
//! Usage:
//!   cargo run -p plaza_server -- [--addr 127.0.0.1:4000] [--max-players 16]
//!                                [--spawn-radius 7] [--queue-depth 64]
//!                                [--overflow drop_oldest|disconnect]
//!
//! The relay listens for client connections, admits them up to capacity,
//! and rebroadcasts their state updates to every other connected client.

use std::env;

use anyhow::Context;
use plaza_server::RelayServer;
use plaza_shared::config::{OverflowPolicy, RelayConfig};
use tracing::info;

fn parse_args() -> RelayConfig {
    let mut cfg = RelayConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.listen_addr = args[i + 1].clone();
                i += 2;
            }
            "--max-players" if i + 1 < args.len() => {
                cfg.max_players = args[i + 1].parse().unwrap_or(cfg.max_players);
                i += 2;
            }
            "--spawn-radius" if i + 1 < args.len() => {
                cfg.spawn_radius = args[i + 1].parse().unwrap_or(cfg.spawn_radius);
                i += 2;
            }
            "--queue-depth" if i + 1 < args.len() => {
                cfg.outbound_depth = args[i + 1].parse().unwrap_or(cfg.outbound_depth);
                i += 2;
            }
            "--overflow" if i + 1 < args.len() => {
                cfg.overflow_policy = match args[i + 1].as_str() {
                    "disconnect" => OverflowPolicy::Disconnect,
                    _ => OverflowPolicy::DropOldest,
                };
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(
        addr = %cfg.listen_addr,
        max_players = cfg.max_players,
        spawn_radius = cfg.spawn_radius,
        "Starting relay"
    );

    let server = RelayServer::bind(cfg).await.context("bind relay")?;
    let local = server.local_addr()?;
    info!(%local, "Relay listening");

    server.run().await
}
