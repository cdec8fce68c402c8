//! # Observability
//!
//! Shared logging setup for the relaychat crates.
//!
//! Library crates only emit `tracing` events; the binary calls
//! [`init_with_config`] once at startup. With the `dev` feature (on by
//! default) every event is appended as one JSON object per line to
//! `~/.relaychat/logs/dev.jsonl`, which can be followed with
//! `tail -f ~/.relaychat/logs/dev.jsonl | jq`.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "relaychat".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! })?;
//! ```

#[cfg(feature = "dev")]
mod dev;

mod json_layer;

use std::io;
use std::path::PathBuf;

pub use json_layer::{JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Written into every log line as `service`.
    pub service_name: String,

    /// Filter used when `RUST_LOG` is unset (e.g. "debug", "info,chat_relay=trace").
    pub default_level: String,

    /// Overrides the central file location.
    pub log_path: Option<PathBuf>,

    /// Mirror events to stderr in compact form.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Central log file: `~/.relaychat/logs/dev.jsonl`.
pub fn default_log_path() -> io::Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".relaychat").join("logs").join("dev.jsonl"))
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "home directory not found"))
}

/// Initialize logging with defaults for `service_name`.
pub fn init(service_name: &str) -> io::Result<()> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Install the global subscriber. Fails if the log file cannot be opened.
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    install(&config)
}

#[cfg(feature = "dev")]
fn install(config: &LogConfig) -> io::Result<()> {
    dev::init_dev_subscriber(config)
}

#[cfg(not(feature = "dev"))]
fn install(config: &LogConfig) -> io::Result<()> {
    use tracing_subscriber::util::SubscriberInitExt;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.default_level)),
        )
        .with_target(true)
        .with_writer(io::stderr)
        .compact()
        .finish()
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}

pub use tracing::{debug, error, info, trace, warn, Level};
