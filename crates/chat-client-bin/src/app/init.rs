//! Client startup and shutdown.

use super::bridge::spawn_relay_bridge;
use super::input::compose_message;
use chat_config_and_utils::Config;
use chat_relay::RelayClient;
use chatting_service::{ChattingService, MessageKind};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

/// Run the client until stdin closes or ctrl-c.
pub async fn run_client(
    config: Config,
    conversation: String,
    token: String,
    device_id: String,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        relay_url = %config.relay_url,
        ack_timeout_ms = config.ack_timeout_ms,
        conversation = %conversation,
        "Starting relaychat"
    );

    let relay = Arc::new(RelayClient::new(config.relay_config()));
    let service = ChattingService::new(relay.clone(), config.coordinator_config());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let bridge = spawn_relay_bridge(relay.subscribe(), service.clone(), shutdown_rx);

    let connection = {
        let relay = relay.clone();
        tokio::spawn(async move {
            if let Err(e) = relay.connect(&token, &device_id).await {
                error!(error = %e, "Relay connection task failed");
            }
        })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Some(payload) = compose_message(&conversation, &line) {
                        let disposition = service.send(MessageKind::SendMessage, payload, None).await;
                        debug!(?disposition, "Message submitted");
                    }
                }
                None => {
                    info!("Input closed");
                    break;
                }
            },
        }
    }

    let status = service.status().await;
    let (dropped_pending, dropped_offline) = service.clear().await;
    info!(
        dropped_pending,
        dropped_offline,
        ready_to_send = status.ready_to_send,
        "Shutting down"
    );

    relay.disconnect().await;
    let _ = shutdown_tx.send(());
    let _ = bridge.await;
    connection.abort();

    Ok(())
}
