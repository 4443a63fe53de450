//! Shared helpers for the socket-level tests in `tests/`.

use std::time::Duration;

use plaza_client::RelayClient;
use plaza_server::RelayServer;
use plaza_shared::config::RelayConfig;
use plaza_shared::net::ServerEvent;

/// Binds a relay on an ephemeral port with the given config.
pub async fn bind_ephemeral(mut cfg: RelayConfig) -> anyhow::Result<RelayServer> {
    cfg.listen_addr = "127.0.0.1:0".to_string();
    RelayServer::bind(cfg).await
}

/// Polls until the client yields an event or `deadline` elapses.
pub async fn next_event(
    client: &mut RelayClient,
    deadline: Duration,
) -> anyhow::Result<Option<ServerEvent>> {
    tokio::time::timeout(deadline, async {
        loop {
            if let Some(event) = client.poll_event(Duration::from_millis(20)).await? {
                return Ok(event);
            }
        }
    })
    .await
    .ok()
    .transpose()
}
