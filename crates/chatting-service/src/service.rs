//! Acknowledgement-gated delivery coordinator.

use crate::{ChatTransport, DeliveryItem, MessageKind, TransportError, TransportResult};
use delivery_queue::DeliveryQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

/// Default round-trip timeout for a single transmit.
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 5000;

/// Callback receiving the server's acknowledgement payload.
///
/// Informational only: the coordinator reopens the gate and drains queued
/// items on its own once an acknowledgement arrives.
pub type OnResult = Box<dyn FnOnce(serde_json::Value) + Send + 'static>;

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct ChattingConfig {
    /// Round-trip timeout for each transmit, in milliseconds.
    pub ack_timeout_ms: u64,
    /// Capacity of the delivery event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ChattingConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            event_capacity: 256,
        }
    }
}

impl ChattingConfig {
    fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

/// What `send` did with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDisposition {
    /// Transmitted immediately; the ack is awaited in the background.
    Dispatched,
    /// Another send is awaiting its ack; queued behind it.
    QueuedPending,
    /// The transport is down; kept for replay on reconnect.
    StoredOffline,
}

/// Result of an offline-store replay request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// The offline store was replayed to empty.
    Completed { replayed: usize },
    /// A replayed item failed; it stays at the head of the offline store.
    Stopped { replayed: usize, remaining: usize },
    /// A send was in flight; its holder runs the replay once it settles.
    Deferred { queued: usize },
}

/// Events emitted as items move through the pipeline.
#[derive(Debug, Clone)]
pub enum DeliveryEvent {
    /// Handed to the transport.
    Dispatched { id: String, kind: MessageKind },
    /// Acknowledged by the server.
    Acknowledged {
        id: String,
        kind: MessageKind,
        response: serde_json::Value,
    },
    /// Deferred behind an outstanding ack.
    QueuedPending { id: String, kind: MessageKind },
    /// Stored while disconnected.
    StoredOffline { id: String, kind: MessageKind },
    /// A transmit failed; the item now waits in the offline store.
    Demoted {
        id: String,
        kind: MessageKind,
        reason: String,
    },
    /// Offline replay requested.
    ReplayStarted { queued: usize, deferred: bool },
    /// Offline replay ended, either drained or stopped by a failure.
    ReplayFinished { remaining: usize },
}

/// Snapshot of the coordinator's queues and gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStatus {
    pub pending: usize,
    pub offline: usize,
    pub ready_to_send: bool,
    pub replaying: bool,
}

/// Acknowledgement gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    /// Next send transmits immediately.
    Open,
    /// A task holds the gate and is transmitting.
    InFlight,
    /// A transmit failed; closed until replay or a manual pending drain.
    Stalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Fresh,
    Pending,
    Offline,
}

struct Job {
    item: DeliveryItem,
    source: Source,
    on_result: Option<OnResult>,
}

#[derive(Debug, Default)]
struct DriveReport {
    delivered: usize,
    replayed: usize,
    failed: bool,
}

struct DeliveryState {
    offline_store: DeliveryQueue<DeliveryItem>,
    pending_queue: DeliveryQueue<DeliveryItem>,
    gate: Gate,
    replay_requested: bool,
}

struct Inner<T> {
    transport: Arc<T>,
    config: ChattingConfig,
    state: Mutex<DeliveryState>,
    events: broadcast::Sender<DeliveryEvent>,
}

/// Delivery coordinator for one client session.
///
/// Enforces at most one unacknowledged transmit at a time. Cloning is cheap
/// and every clone drives the same queues.
pub struct ChattingService<T: ChatTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: ChatTransport> Clone for ChattingService<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ChatTransport> ChattingService<T> {
    /// Create a coordinator over the given transport.
    pub fn new(transport: Arc<T>, config: ChattingConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                state: Mutex::new(DeliveryState {
                    offline_store: DeliveryQueue::new(),
                    pending_queue: DeliveryQueue::new(),
                    gate: Gate::Open,
                    replay_requested: false,
                }),
                events,
            }),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults(transport: Arc<T>) -> Self {
        Self::new(transport, ChattingConfig::default())
    }

    /// Subscribe to delivery events.
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.inner.events.subscribe()
    }

    /// The transport this coordinator drives.
    pub fn transport(&self) -> &Arc<T> {
        &self.inner.transport
    }

    /// Send a chat event.
    ///
    /// Returns as soon as the item is dispatched or queued. `on_result` runs
    /// only if this call dispatched the item and the server acknowledged it;
    /// queued items never invoke it.
    pub async fn send(
        &self,
        kind: MessageKind,
        payload: serde_json::Value,
        on_result: Option<OnResult>,
    ) -> SendDisposition {
        self.submit(DeliveryItem::new(kind, payload), on_result).await
    }

    /// Send a prebuilt item. See [`ChattingService::send`].
    pub async fn submit(&self, item: DeliveryItem, on_result: Option<OnResult>) -> SendDisposition {
        let mut state = self.inner.state.lock().await;

        if !self.inner.transport.is_connected().await {
            debug!(item_id = %item.id, kind = ?item.kind, "Transport down, storing offline");
            self.emit(DeliveryEvent::StoredOffline {
                id: item.id.clone(),
                kind: item.kind,
            });
            state.offline_store.enqueue(item);
            return SendDisposition::StoredOffline;
        }

        if state.gate != Gate::Open {
            debug!(
                item_id = %item.id,
                kind = ?item.kind,
                pending = state.pending_queue.size() + 1,
                "Ack outstanding, queueing"
            );
            self.emit(DeliveryEvent::QueuedPending {
                id: item.id.clone(),
                kind: item.kind,
            });
            state.pending_queue.enqueue(item);
            return SendDisposition::QueuedPending;
        }

        state.gate = Gate::InFlight;
        drop(state);

        let job = Job {
            item,
            source: Source::Fresh,
            on_result,
        };
        let service = self.clone();
        tokio::spawn(async move {
            service.drive(Some(job)).await;
        });

        SendDisposition::Dispatched
    }

    /// Flush the pending queue.
    ///
    /// Claims the gate when nothing is in flight, including after a failed
    /// transmit. When a send is already awaiting its ack this is a no-op:
    /// the gate holder flushes the queue once it settles. Returns the number
    /// of items acknowledged.
    pub async fn drain_pending_queue(&self) -> usize {
        {
            let mut state = self.inner.state.lock().await;
            if state.gate == Gate::InFlight || state.pending_queue.is_empty() {
                return 0;
            }
            state.gate = Gate::InFlight;
        }

        self.drive(None).await.delivered
    }

    /// Replay the offline store serially, then resume normal sending.
    ///
    /// Meant to be called by the host whenever the transport reconnects.
    /// Items leave the offline store only once acknowledged; the first
    /// failure stops the replay and keeps the gate closed until the next call.
    pub async fn drain_offline_store(&self) -> ReplayOutcome {
        {
            let mut state = self.inner.state.lock().await;
            state.replay_requested = true;
            let queued = state.offline_store.size();

            if state.gate == Gate::InFlight {
                info!(queued, "Send in flight, offline replay deferred");
                self.emit(DeliveryEvent::ReplayStarted {
                    queued,
                    deferred: true,
                });
                return ReplayOutcome::Deferred { queued };
            }

            state.gate = Gate::InFlight;
            info!(queued, "Replaying offline store");
            self.emit(DeliveryEvent::ReplayStarted {
                queued,
                deferred: false,
            });
        }

        let report = self.drive(None).await;
        if report.failed {
            let remaining = self.offline_len().await;
            ReplayOutcome::Stopped {
                replayed: report.replayed,
                remaining,
            }
        } else {
            ReplayOutcome::Completed {
                replayed: report.replayed,
            }
        }
    }

    /// Alias for [`ChattingService::drain_offline_store`].
    pub async fn send_offline_messages(&self) -> ReplayOutcome {
        self.drain_offline_store().await
    }

    /// Number of items waiting behind an outstanding ack.
    pub async fn pending_len(&self) -> usize {
        self.inner.state.lock().await.pending_queue.size()
    }

    /// Number of items waiting for the next reconnect.
    pub async fn offline_len(&self) -> usize {
        self.inner.state.lock().await.offline_store.size()
    }

    /// Whether the next send would transmit immediately (gate open).
    pub async fn is_ready_to_send(&self) -> bool {
        self.inner.state.lock().await.gate == Gate::Open
    }

    /// Whether an item with this id is waiting in either queue.
    pub async fn is_queued(&self, id: &str) -> bool {
        let state = self.inner.state.lock().await;
        state.pending_queue.is_duplicate(id) || state.offline_store.is_duplicate(id)
    }

    /// Snapshot of queue depths and gate state.
    pub async fn status(&self) -> DeliveryStatus {
        let state = self.inner.state.lock().await;
        DeliveryStatus {
            pending: state.pending_queue.size(),
            offline: state.offline_store.size(),
            ready_to_send: state.gate == Gate::Open,
            replaying: state.replay_requested,
        }
    }

    /// Discard both queues. Returns `(pending, offline)` counts dropped.
    ///
    /// Used on session teardown. An in-flight transmit is not cancelled.
    pub async fn clear(&self) -> (usize, usize) {
        let mut state = self.inner.state.lock().await;
        let dropped = (state.pending_queue.size(), state.offline_store.size());
        state.pending_queue.clear();
        state.offline_store.clear();
        state.replay_requested = false;
        if state.gate == Gate::Stalled {
            state.gate = Gate::Open;
        }

        info!(
            pending = dropped.0,
            offline = dropped.1,
            "Cleared delivery queues"
        );
        dropped
    }

    /// Run jobs while holding the gate until there is nothing left or a
    /// transmit fails.
    async fn drive(&self, first: Option<Job>) -> DriveReport {
        let mut report = DriveReport::default();
        let mut next = first;

        loop {
            let job = match next.take() {
                Some(job) => job,
                None => match self.next_job().await {
                    Some(job) => job,
                    None => return report,
                },
            };

            let Job {
                item,
                source,
                on_result,
            } = job;

            match self.transmit(&item).await {
                Ok(response) => {
                    if source == Source::Offline {
                        let mut state = self.inner.state.lock().await;
                        // The store may have been cleared while this item was in flight
                        if state.offline_store.peek().map(|head| head.id == item.id) == Some(true) {
                            state.offline_store.dequeue();
                        }
                        drop(state);
                        report.replayed += 1;
                    } else {
                        report.delivered += 1;
                    }

                    debug!(item_id = %item.id, kind = ?item.kind, source = ?source, "Acknowledged");
                    self.emit(DeliveryEvent::Acknowledged {
                        id: item.id,
                        kind: item.kind,
                        response: response.clone(),
                    });

                    if let Some(on_result) = on_result {
                        on_result(response);
                    }
                }
                Err(e) => {
                    self.settle_failure(item, source, e).await;
                    report.failed = true;
                    return report;
                }
            }
        }
    }

    /// Pick the next job for the gate holder, or reopen the gate.
    ///
    /// Offline replay takes priority over the pending queue.
    async fn next_job(&self) -> Option<Job> {
        let mut state = self.inner.state.lock().await;

        if state.replay_requested {
            if let Some(item) = state.offline_store.peek() {
                return Some(Job {
                    item: item.clone(),
                    source: Source::Offline,
                    on_result: None,
                });
            }

            state.replay_requested = false;
            info!("Offline store replayed");
            self.emit(DeliveryEvent::ReplayFinished { remaining: 0 });
        }

        if let Some(item) = state.pending_queue.dequeue() {
            return Some(Job {
                item,
                source: Source::Pending,
                on_result: None,
            });
        }

        state.gate = Gate::Open;
        None
    }

    /// Demote a failed item and stall the gate.
    async fn settle_failure(&self, item: DeliveryItem, source: Source, error: TransportError) {
        let mut state = self.inner.state.lock().await;

        // Replayed items never left the head of the offline store
        if source != Source::Offline {
            state.offline_store.enqueue(item.clone());
        }
        state.gate = Gate::Stalled;

        warn!(
            item_id = %item.id,
            kind = ?item.kind,
            source = ?source,
            offline = state.offline_store.size(),
            error = %error,
            "Send failed, demoted to offline store"
        );
        self.emit(DeliveryEvent::Demoted {
            id: item.id,
            kind: item.kind,
            reason: error.to_string(),
        });

        if state.replay_requested {
            state.replay_requested = false;
            self.emit(DeliveryEvent::ReplayFinished {
                remaining: state.offline_store.size(),
            });
        }
    }

    /// One bounded transmit-and-await-ack round trip.
    async fn transmit(&self, item: &DeliveryItem) -> TransportResult<serde_json::Value> {
        let transport = &self.inner.transport;
        if !transport.is_connected().await {
            return Err(TransportError::Disconnected);
        }

        self.emit(DeliveryEvent::Dispatched {
            id: item.id.clone(),
            kind: item.kind,
        });

        let timeout = self.inner.config.ack_timeout();
        let round_trip = transport.send_with_ack(item.kind.event_name(), item.payload.clone(), timeout);

        match tokio::time::timeout(timeout, round_trip).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                timeout_ms: self.inner.config.ack_timeout_ms,
            }),
        }
    }

    fn emit(&self, event: DeliveryEvent) {
        let _ = self.inner.events.send(event);
    }
}
