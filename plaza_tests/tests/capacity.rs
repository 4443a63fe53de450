//! Admission capacity and identity allocation over real sockets.

use std::time::Duration;

use plaza_client::{Rejected, RelayClient};
use plaza_shared::config::RelayConfig;
use plaza_shared::net::ServerEvent;
use plaza_tests::{bind_ephemeral, next_event};

fn two_seat_config() -> RelayConfig {
    RelayConfig {
        max_players: 2,
        ..RelayConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn admission_beyond_capacity_is_rejected() -> anyhow::Result<()> {
    let server = bind_ephemeral(two_seat_config()).await?;
    let addr = server.local_addr()?;
    let server_task = tokio::spawn(server.run());

    let _first = RelayClient::connect(addr).await?;
    let _second = RelayClient::connect(addr).await?;

    let err = RelayClient::connect(addr)
        .await
        .expect_err("third admission must fail");
    let rejected = err
        .downcast_ref::<Rejected>()
        .expect("typed rejection error");
    assert_eq!(rejected.0, "Server is full");

    server_task.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn freed_seat_admits_with_fresh_id() -> anyhow::Result<()> {
    let server = bind_ephemeral(two_seat_config()).await?;
    let addr = server.local_addr()?;
    let server_task = tokio::spawn(server.run());

    let mut first = RelayClient::connect(addr).await?;
    let second = RelayClient::connect(addr).await?;
    let second_id = second.player_id;

    // Wait until the relay has processed the departure before reconnecting.
    drop(second);
    loop {
        let event = next_event(&mut first, Duration::from_secs(2))
            .await?
            .expect("departure broadcast");
        if event == ServerEvent::PlayerDisconnected(second_id) {
            break;
        }
    }

    let third = RelayClient::connect(addr).await?;
    assert_eq!(third.player_id, 3, "ids are never reused");
    assert_eq!(third.replica().len(), 2);

    server_task.abort();
    Ok(())
}
