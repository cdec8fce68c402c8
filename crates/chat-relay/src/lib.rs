//! WebSocket relay transport for the chat client.
//!
//! This crate provides:
//! - WebSocket connection to the chat relay
//! - Automatic reconnection with exponential backoff
//! - Acknowledged sends correlated by ack id
//! - Heartbeat for connection keepalive
//! - A `ChatTransport` implementation for the delivery coordinator

mod client;
mod error;
mod messages;

pub use client::{ConnectionState, RelayClient, RelayConfig, RelayEvent};
pub use error::{RelayError, RelayResult};
pub use messages::{RelayMessage, RelayMessageType};
