//! Relay event handling: replays the offline store whenever the relay
//! (re)authenticates, and logs delivery progress.

use chat_relay::RelayEvent;
use chatting_service::{ChatTransport, ChattingService, DeliveryEvent, ReplayOutcome};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawn the task that connects relay events to the coordinator.
pub fn spawn_relay_bridge<T: ChatTransport>(
    mut relay_events: broadcast::Receiver<RelayEvent>,
    service: ChattingService<T>,
    mut shutdown: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    let mut deliveries = service.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("Relay bridge received shutdown signal");
                    break;
                }
                event = relay_events.recv() => match event {
                    Ok(event) => handle_relay_event(&service, event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // A missed Connected would strand the offline store
                        warn!(skipped, "Relay events lagged; replaying offline store");
                        replay(&service).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                event = deliveries.recv() => match event {
                    Ok(event) => log_delivery(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Delivery events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        debug!("Relay bridge stopped");
    })
}

async fn handle_relay_event<T: ChatTransport>(service: &ChattingService<T>, event: RelayEvent) {
    match event {
        RelayEvent::Connected => {
            info!("Relay connected");
            replay(service).await;
        }
        RelayEvent::Disconnected(reason) => {
            let status = service.status().await;
            warn!(
                reason = reason.as_deref().unwrap_or("connection closed"),
                pending = status.pending,
                offline = status.offline,
                "Relay disconnected"
            );
        }
        RelayEvent::AuthenticationFailed(reason) => {
            warn!(reason = %reason, "Relay rejected credentials");
        }
        RelayEvent::Incoming(msg) => {
            let payload = msg.payload.unwrap_or_default();
            let text = payload.get("text").and_then(|t| t.as_str()).unwrap_or_default();
            println!("< {}", text);
        }
        RelayEvent::Error(error) => warn!(error = %error, "Relay reported an error"),
    }
}

async fn replay<T: ChatTransport>(service: &ChattingService<T>) {
    match service.drain_offline_store().await {
        ReplayOutcome::Completed { replayed } => {
            if replayed > 0 {
                info!(replayed, "Offline messages delivered");
            }
        }
        ReplayOutcome::Stopped { replayed, remaining } => {
            warn!(replayed, remaining, "Offline replay stopped on a failed send");
        }
        ReplayOutcome::Deferred { queued } => {
            debug!(queued, "Offline replay deferred behind in-flight send");
        }
    }
}

fn log_delivery(event: &DeliveryEvent) {
    match event {
        DeliveryEvent::Acknowledged { id, kind, .. } => {
            debug!(item_id = %id, kind = ?kind, "Delivered");
        }
        DeliveryEvent::Demoted { id, reason, .. } => {
            warn!(item_id = %id, reason = %reason, "Send failed; kept for replay");
        }
        DeliveryEvent::StoredOffline { id, .. } => {
            info!(item_id = %id, "Offline; message stored for later");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatting_service::{MessageKind, TransportResult};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct LoopbackTransport {
        connected: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatTransport for LoopbackTransport {
        async fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn send_with_ack(
            &self,
            _event: &str,
            payload: serde_json::Value,
            _timeout: Duration,
        ) -> TransportResult<serde_json::Value> {
            let text = payload["text"].as_str().unwrap_or_default().to_string();
            self.sent.lock().unwrap().push(text);
            Ok(json!({}))
        }
    }

    #[tokio::test]
    async fn test_connected_event_replays_offline_store() {
        let transport = Arc::new(LoopbackTransport::default());
        let service = ChattingService::with_defaults(transport.clone());

        service
            .send(MessageKind::SendMessage, json!({"text": "first"}), None)
            .await;
        service
            .send(MessageKind::SendMessage, json!({"text": "second"}), None)
            .await;
        assert_eq!(service.offline_len().await, 2);

        let (relay_tx, relay_rx) = broadcast::channel(8);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let bridge = spawn_relay_bridge(relay_rx, service.clone(), shutdown_rx);

        transport.connected.store(true, Ordering::SeqCst);
        relay_tx.send(RelayEvent::Connected).unwrap();

        for _ in 0..200 {
            if service.offline_len().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(service.offline_len().await, 0);
        assert_eq!(*transport.sent.lock().unwrap(), vec!["first", "second"]);

        shutdown_tx.send(()).unwrap();
        bridge.await.unwrap();
    }

    #[tokio::test]
    async fn test_bridge_stops_when_relay_channel_closes() {
        let service = ChattingService::with_defaults(Arc::new(LoopbackTransport::default()));
        let (relay_tx, relay_rx) = broadcast::channel::<RelayEvent>(8);
        let (_shutdown_tx, shutdown_rx) = oneshot::channel();

        let bridge = spawn_relay_bridge(relay_rx, service, shutdown_rx);
        drop(relay_tx);

        tokio::time::timeout(Duration::from_secs(5), bridge)
            .await
            .unwrap()
            .unwrap();
    }
}
