//! End-to-end delivery scenarios against a scripted in-memory transport.
//!
//! The transport records every transmit and releases acknowledgements only
//! when the test says so, which makes the ordering of sends observable.

use async_trait::async_trait;
use chatting_service::{
    ChatTransport, ChattingConfig, ChattingService, DeliveryEvent, MessageKind, ReplayOutcome,
    SendDisposition, TransportError, TransportResult,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};

struct ScriptedTransport {
    connected: AtomicBool,
    transmitted: Mutex<Vec<String>>,
    acks: Semaphore,
}

impl ScriptedTransport {
    fn new(connected: bool) -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(connected),
            transmitted: Mutex::new(Vec::new()),
            acks: Semaphore::new(0),
        })
    }

    fn reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    fn release_acks(&self, count: usize) {
        self.acks.add_permits(count);
    }

    fn transmitted(&self) -> Vec<String> {
        self.transmitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_with_ack(
        &self,
        _event: &str,
        payload: serde_json::Value,
        _timeout: Duration,
    ) -> TransportResult<serde_json::Value> {
        let label = payload["text"].as_str().unwrap_or_default().to_string();
        self.transmitted.lock().unwrap().push(label.clone());

        self.acks
            .acquire()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?
            .forget();

        Ok(json!({ "messageId": format!("srv-{}", label) }))
    }
}

fn message(text: &str) -> serde_json::Value {
    json!({ "conversationId": "conv-1", "text": text })
}

async fn next_matching<F>(events: &mut broadcast::Receiver<DeliveryEvent>, mut matches: F)
where
    F: FnMut(&DeliveryEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if matches(&event) {
                return;
            }
        }
    })
    .await
    .expect("expected delivery event");
}

#[tokio::test]
async fn test_offline_items_replay_in_order_after_reconnect() {
    let transport = ScriptedTransport::new(false);
    let service = ChattingService::with_defaults(transport.clone());

    assert_eq!(
        service.send(MessageKind::SendMessage, message("A"), None).await,
        SendDisposition::StoredOffline
    );
    assert_eq!(
        service.send(MessageKind::SendMessage, message("B"), None).await,
        SendDisposition::StoredOffline
    );
    assert_eq!(service.offline_len().await, 2);
    assert!(transport.transmitted().is_empty());

    transport.reconnect();
    transport.release_acks(2);
    let outcome = service.drain_offline_store().await;

    assert_eq!(outcome, ReplayOutcome::Completed { replayed: 2 });
    assert_eq!(transport.transmitted(), vec!["A", "B"]);
    assert_eq!(service.offline_len().await, 0);
    assert!(service.is_ready_to_send().await);
}

#[tokio::test]
async fn test_pending_item_sent_after_ack() {
    let transport = ScriptedTransport::new(true);
    let service = ChattingService::with_defaults(transport.clone());
    let mut events = service.subscribe();
    let (ack_tx, ack_rx) = tokio::sync::oneshot::channel();

    let disposition = service
        .send(
            MessageKind::SendMessage,
            message("X"),
            Some(Box::new(move |response| {
                let _ = ack_tx.send(response);
            })),
        )
        .await;
    assert_eq!(disposition, SendDisposition::Dispatched);
    next_matching(&mut events, |e| matches!(e, DeliveryEvent::Dispatched { .. })).await;
    assert_eq!(transport.transmitted(), vec!["X"]);

    assert_eq!(
        service.send(MessageKind::SendMessage, message("Y"), None).await,
        SendDisposition::QueuedPending
    );
    assert_eq!(service.pending_len().await, 1);
    assert_eq!(transport.transmitted(), vec!["X"]);

    // X acknowledges, the coordinator sends Y on its own
    transport.release_acks(1);
    let response = ack_rx.await.unwrap();
    assert_eq!(response["messageId"], "srv-X");

    next_matching(&mut events, |e| matches!(e, DeliveryEvent::Dispatched { .. })).await;
    assert_eq!(service.pending_len().await, 0);
    assert_eq!(transport.transmitted(), vec!["X", "Y"]);

    transport.release_acks(1);
    next_matching(&mut events, |e| matches!(e, DeliveryEvent::Acknowledged { .. })).await;
    for _ in 0..100 {
        if service.is_ready_to_send().await {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(service.is_ready_to_send().await);
}

#[tokio::test]
async fn test_many_sends_while_in_flight_keep_call_order() {
    let transport = ScriptedTransport::new(true);
    let service = ChattingService::with_defaults(transport.clone());
    let mut events = service.subscribe();

    service.send(MessageKind::SendMessage, message("0"), None).await;
    for i in 1..=5 {
        let disposition = service
            .send(MessageKind::SendMessage, message(&i.to_string()), None)
            .await;
        assert_eq!(disposition, SendDisposition::QueuedPending);
    }
    next_matching(&mut events, |e| matches!(e, DeliveryEvent::Dispatched { .. })).await;
    assert_eq!(transport.transmitted().len(), 1);
    assert_eq!(service.pending_len().await, 5);

    transport.release_acks(6);
    let mut acknowledged = 0;
    next_matching(&mut events, |e| {
        if matches!(e, DeliveryEvent::Acknowledged { .. }) {
            acknowledged += 1;
        }
        acknowledged == 6
    })
    .await;

    assert_eq!(transport.transmitted(), vec!["0", "1", "2", "3", "4", "5"]);
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_send_waits_for_reconnect() {
    let transport = ScriptedTransport::new(true);
    let config = ChattingConfig {
        ack_timeout_ms: 1500,
        ..Default::default()
    };
    let service = ChattingService::new(transport.clone(), config);
    let mut events = service.subscribe();

    service.send(MessageKind::EditMessage, message("slow"), None).await;
    next_matching(&mut events, |e| matches!(e, DeliveryEvent::Demoted { .. })).await;

    assert_eq!(service.offline_len().await, 1);
    assert!(!service.is_ready_to_send().await);

    // Still connected, but nothing is retried until the next replay
    assert_eq!(
        service.send(MessageKind::SendMessage, message("queued"), None).await,
        SendDisposition::QueuedPending
    );
    assert_eq!(transport.transmitted(), vec!["slow"]);

    transport.release_acks(2);
    let outcome = service.send_offline_messages().await;
    assert_eq!(outcome, ReplayOutcome::Completed { replayed: 1 });
    assert_eq!(transport.transmitted(), vec!["slow", "slow", "queued"]);
    assert_eq!(service.status().await.pending, 0);
}
