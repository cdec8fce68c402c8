//! WebSocket relay client.

use crate::{RelayError, RelayMessage, RelayMessageType, RelayResult};
use async_trait::async_trait;
use chatting_service::{ChatTransport, TransportError, TransportResult};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tokio::time::{interval, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

type AckWaiter = oneshot::Sender<RelayResult<serde_json::Value>>;

/// Relay client configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Relay server URL (e.g., wss://relay.relaychat.dev).
    pub url: String,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Base reconnect delay in seconds.
    pub reconnect_base_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub reconnect_max_delay_secs: u64,
    /// Maximum reconnect attempts.
    pub max_reconnect_attempts: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "wss://relay.relaychat.dev".to_string(),
            heartbeat_interval_secs: 30,
            reconnect_base_delay_secs: 2,
            reconnect_max_delay_secs: 30,
            max_reconnect_attempts: 10,
        }
    }
}

impl RelayConfig {
    /// Backoff before reconnect attempt `attempt` (1-based), capped at the max.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let secs = self
            .reconnect_base_delay_secs
            .saturating_mul(1u64 << exponent)
            .min(self.reconnect_max_delay_secs);
        Duration::from_secs(secs)
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
}

/// Events emitted by the relay client.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// Authenticated and ready for acknowledged sends. Fired on every
    /// (re)connect; hosts replay their offline backlog here.
    Connected,
    /// Disconnected from relay.
    Disconnected(Option<String>),
    /// Authentication failed.
    AuthenticationFailed(String),
    /// Server-pushed chat traffic.
    Incoming(RelayMessage),
    /// Error reported by the relay.
    Error(String),
}

/// WebSocket relay client with automatic reconnection.
pub struct RelayClient {
    config: RelayConfig,
    state: Arc<RwLock<ConnectionState>>,
    sender: Arc<Mutex<Option<mpsc::Sender<Message>>>>,
    pending_acks: Arc<Mutex<HashMap<String, AckWaiter>>>,
    event_tx: broadcast::Sender<RelayEvent>,
    auth_token: Arc<RwLock<Option<String>>>,
    device_id: Arc<RwLock<Option<String>>>,
    reconnect_attempts: Arc<RwLock<u32>>,
}

impl RelayClient {
    /// Create a new relay client with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            sender: Arc::new(Mutex::new(None)),
            pending_acks: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
            auth_token: Arc::new(RwLock::new(None)),
            device_id: Arc::new(RwLock::new(None)),
            reconnect_attempts: Arc::new(RwLock::new(0)),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RelayConfig::default())
    }

    /// Subscribe to relay events.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.event_tx.subscribe()
    }

    /// Get the current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Check if connected and authenticated.
    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Connected
    }

    /// Connect to the relay and keep reconnecting until `disconnect` is
    /// called or reconnect attempts run out.
    pub async fn connect(&self, auth_token: &str, device_id: &str) -> RelayResult<()> {
        let current_state = *self.state.read().await;
        if current_state != ConnectionState::Disconnected {
            debug!("Already connecting or connected");
            return Ok(());
        }

        // Stored for reconnection
        *self.auth_token.write().await = Some(auth_token.to_string());
        *self.device_id.write().await = Some(device_id.to_string());
        *self.reconnect_attempts.write().await = 0;

        loop {
            if let Err(e) = self.run_connection().await {
                error!(error = %e, "Relay connection failed");
                *self.state.write().await = ConnectionState::Disconnected;
            }

            if !self.wait_before_reconnect().await {
                break;
            }
        }

        Ok(())
    }

    /// One connection lifetime: connect, authenticate, pump frames until close.
    async fn run_connection(&self) -> RelayResult<()> {
        *self.state.write().await = ConnectionState::Connecting;
        info!(url = %self.config.url, "Connecting to relay");

        let (ws_stream, _) = connect_async(&self.config.url).await?;
        let (mut write, mut read) = ws_stream.split();

        let (msg_tx, mut msg_rx) = mpsc::channel::<Message>(100);
        *self.sender.lock().await = Some(msg_tx.clone());

        *self.state.write().await = ConnectionState::Authenticating;

        let auth_token = self
            .auth_token
            .read()
            .await
            .clone()
            .ok_or_else(|| RelayError::Authentication("No auth token".to_string()))?;
        let device_id = self
            .device_id
            .read()
            .await
            .clone()
            .ok_or_else(|| RelayError::Authentication("No device ID".to_string()))?;

        let auth_json = RelayMessage::auth(&auth_token, &device_id).to_json()?;
        write.send(Message::Text(auth_json.into())).await?;
        debug!("Sent AUTH frame");

        let sender_handle = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let heartbeat_sender = msg_tx;
        let heartbeat_interval = self.config.heartbeat_interval_secs.max(1);
        let heartbeat_handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(heartbeat_interval));
            loop {
                ticker.tick().await;
                if let Ok(json) = RelayMessage::heartbeat().to_json() {
                    if heartbeat_sender
                        .send(Message::Text(json.into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        });

        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match RelayMessage::from_json(&text) {
                    Ok(relay_msg) => self.handle_message(relay_msg).await,
                    Err(e) => warn!(error = %e, "Failed to parse relay frame"),
                },
                Ok(Message::Close(_)) => {
                    info!("Relay connection closed");
                    break;
                }
                Ok(Message::Ping(data)) => {
                    if let Some(sender) = self.sender.lock().await.as_ref() {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "WebSocket error");
                    break;
                }
            }
        }

        heartbeat_handle.abort();
        sender_handle.abort();
        self.teardown_connection(None).await;

        Ok(())
    }

    /// Reset connection state and fail every outstanding ack waiter.
    async fn teardown_connection(&self, reason: Option<String>) {
        *self.sender.lock().await = None;
        *self.state.write().await = ConnectionState::Disconnected;

        let waiters: Vec<_> = self.pending_acks.lock().await.drain().collect();
        if !waiters.is_empty() {
            warn!(count = waiters.len(), "Dropping unacknowledged events on disconnect");
        }
        for (_, waiter) in waiters {
            let _ = waiter.send(Err(RelayError::NotConnected));
        }

        let _ = self.event_tx.send(RelayEvent::Disconnected(reason));
    }

    /// Handle an incoming relay frame.
    async fn handle_message(&self, msg: RelayMessage) {
        match msg.msg_type {
            RelayMessageType::AuthResult => {
                if msg.success == Some(true) {
                    *self.state.write().await = ConnectionState::Connected;
                    *self.reconnect_attempts.write().await = 0;
                    info!("Authenticated with relay");
                    let _ = self.event_tx.send(RelayEvent::Connected);
                } else {
                    let error = msg.error.unwrap_or_else(|| "Unknown error".to_string());
                    *self.state.write().await = ConnectionState::Disconnected;
                    error!(error = %error, "Authentication failed");
                    let _ = self.event_tx.send(RelayEvent::AuthenticationFailed(error));
                }
            }
            RelayMessageType::Ack => self.resolve_ack(msg).await,
            RelayMessageType::Error => {
                let error = msg.error.unwrap_or_else(|| "Unknown error".to_string());
                warn!(error = %error, "Relay error");
                let _ = self.event_tx.send(RelayEvent::Error(error));
            }
            RelayMessageType::Heartbeat => {}
            _ => {
                debug!(msg_type = ?msg.msg_type, "Received frame");
                let _ = self.event_tx.send(RelayEvent::Incoming(msg));
            }
        }
    }

    /// Complete the waiter registered for this ACK's id.
    async fn resolve_ack(&self, msg: RelayMessage) {
        let Some(ack_id) = msg.ack_id else {
            warn!("ACK frame without ackId");
            return;
        };

        let Some(waiter) = self.pending_acks.lock().await.remove(&ack_id) else {
            // Late ack for an event that already timed out
            debug!(ack_id = %ack_id, "No waiter for ack");
            return;
        };

        let result = if msg.success == Some(false) {
            Err(RelayError::Rejected(
                msg.error.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        } else {
            Ok(msg.payload.unwrap_or(serde_json::Value::Null))
        };
        let _ = waiter.send(result);
    }

    /// Sleep for the backoff delay. Returns false when reconnecting should stop.
    async fn wait_before_reconnect(&self) -> bool {
        if self.auth_token.read().await.is_none() {
            return false;
        }

        let attempt = {
            let mut attempts = self.reconnect_attempts.write().await;
            *attempts += 1;
            *attempts
        };

        if attempt > self.config.max_reconnect_attempts {
            warn!("Max reconnect attempts reached");
            return false;
        }

        let delay = self.config.reconnect_delay(attempt);
        info!(attempt, delay_secs = delay.as_secs(), "Scheduling reconnect");
        tokio::time::sleep(delay).await;

        self.auth_token.read().await.is_some()
    }

    /// Disconnect from the relay and stop reconnecting.
    pub async fn disconnect(&self) {
        *self.reconnect_attempts.write().await = self.config.max_reconnect_attempts + 1;
        *self.auth_token.write().await = None;
        *self.device_id.write().await = None;

        self.teardown_connection(Some("User disconnected".to_string()))
            .await;
        info!("Disconnected from relay");
    }

    /// Send a frame to the relay without waiting for a reply.
    pub async fn send_message(&self, msg: RelayMessage) -> RelayResult<()> {
        let sender = self.sender.lock().await;
        let sender = sender.as_ref().ok_or(RelayError::NotConnected)?;

        let json = msg.to_json()?;
        sender
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| RelayError::Send(e.to_string()))
    }

    /// Emit a chat event and wait for the relay's ACK.
    pub async fn send_with_ack(
        &self,
        event_name: &str,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> RelayResult<serde_json::Value> {
        if !self.is_connected().await {
            return Err(RelayError::NotConnected);
        }

        let ack_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending_acks.lock().await.insert(ack_id.clone(), tx);

        let frame = RelayMessage::event(event_name, &ack_id, payload);
        if let Err(e) = self.send_message(frame).await {
            self.pending_acks.lock().await.remove(&ack_id);
            return Err(e);
        }
        debug!(event = %event_name, ack_id = %ack_id, "Event sent, awaiting ack");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            // Waiter dropped without an answer
            Ok(Err(_)) => Err(RelayError::NotConnected),
            Err(_) => {
                self.pending_acks.lock().await.remove(&ack_id);
                Err(RelayError::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    /// Number of events awaiting an ACK.
    pub async fn outstanding_acks(&self) -> usize {
        self.pending_acks.lock().await.len()
    }
}

#[async_trait]
impl ChatTransport for RelayClient {
    async fn is_connected(&self) -> bool {
        RelayClient::is_connected(self).await
    }

    async fn send_with_ack(
        &self,
        event: &str,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> TransportResult<serde_json::Value> {
        RelayClient::send_with_ack(self, event, payload, timeout)
            .await
            .map_err(TransportError::from)
    }
}
