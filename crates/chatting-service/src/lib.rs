//! Offline-resilient chat delivery pipeline.
//!
//! This crate provides:
//! - ChattingService: coordinator enforcing at most one unacknowledged send,
//!   deferring to a pending queue while an ack is outstanding and to an
//!   offline store while disconnected or after a failed send
//! - ChatTransport: the connection abstraction the coordinator drives
//! - DeliveryItem / MessageKind: the tagged payloads moving through the queues

mod error;
mod item;
mod service;
mod transport;

pub use error::{TransportError, TransportResult};
pub use item::{DeliveryItem, MessageKind};
pub use service::{
    ChattingConfig, ChattingService, DeliveryEvent, DeliveryStatus, OnResult, ReplayOutcome,
    SendDisposition, DEFAULT_ACK_TIMEOUT_MS,
};
pub use transport::ChatTransport;
