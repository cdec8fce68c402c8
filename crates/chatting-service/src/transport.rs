//! Connection abstraction driven by the coordinator.

use crate::TransportResult;
use async_trait::async_trait;
use std::time::Duration;

/// A persistent bidirectional connection with request/acknowledge sends.
///
/// Reconnect notification is not part of this trait: the host observes its
/// transport's own events and calls
/// [`ChattingService::drain_offline_store`](crate::ChattingService::drain_offline_store).
#[async_trait]
pub trait ChatTransport: Send + Sync + 'static {
    /// Current connectivity as observed by the transport.
    async fn is_connected(&self) -> bool;

    /// Emit `event` with `payload` and wait up to `timeout` for the
    /// server's acknowledgement payload.
    async fn send_with_ack(
        &self,
        event: &str,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> TransportResult<serde_json::Value>;
}
