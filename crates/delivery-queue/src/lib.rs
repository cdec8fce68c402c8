//! FIFO delivery queue for outbound chat payloads.
//!
//! This crate provides:
//! - DeliveryQueue: append-at-tail / remove-from-head queue backed by a
//!   sparse position index, so head removal never shifts storage
//! - Identified: opt-in trait enabling duplicate checks by item id

mod queue;

pub use queue::{DeliveryQueue, Identified, Iter};
