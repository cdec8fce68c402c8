//! Client wiring and lifecycle.

mod bridge;
mod init;
mod input;

pub use init::run_client;
