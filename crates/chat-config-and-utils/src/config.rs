//! Client configuration.

use crate::{CoreError, CoreResult, Paths};
use chat_relay::RelayConfig;
use chatting_service::{ChattingConfig, DEFAULT_ACK_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default relay endpoint (can be overridden at compile time via RELAYCHAT_RELAY_URL).
pub const DEFAULT_RELAY_URL: &str = match option_env!("RELAYCHAT_RELAY_URL") {
    Some(url) => url,
    None => "wss://relay.relaychat.dev",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Main client configuration, stored as `~/.relaychat/config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// WebSocket relay URL.
    pub relay_url: String,
    /// Round-trip timeout for each acknowledged send.
    pub ack_timeout_ms: u64,
    pub heartbeat_interval_secs: u64,
    pub reconnect_base_delay_secs: u64,
    pub reconnect_max_delay_secs: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        let relay = RelayConfig::default();
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            relay_url: DEFAULT_RELAY_URL.to_string(),
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            heartbeat_interval_secs: relay.heartbeat_interval_secs,
            reconnect_base_delay_secs: relay.reconnect_base_delay_secs,
            reconnect_max_delay_secs: relay.reconnect_max_delay_secs,
            max_reconnect_attempts: relay.max_reconnect_attempts,
        }
    }
}

impl Config {
    /// Defaults with environment overrides applied.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load the config file if present, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `RELAYCHAT_*` overrides from `lookup`. Unparseable values are ignored.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(log_level) = lookup("RELAYCHAT_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(relay_url) = lookup("RELAYCHAT_RELAY_URL") {
            self.relay_url = relay_url;
        }
        if let Some(raw) = lookup("RELAYCHAT_ACK_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => self.ack_timeout_ms = ms,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid RELAYCHAT_ACK_TIMEOUT_MS"),
            }
        }
    }

    /// Reject values the client cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        let url = self.relay_url()?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(CoreError::Config(format!(
                "relay_url must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }
        if self.ack_timeout_ms == 0 {
            return Err(CoreError::Config(
                "ack_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The relay URL, parsed.
    pub fn relay_url(&self) -> CoreResult<Url> {
        Url::parse(&self.relay_url).map_err(CoreError::from)
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            url: self.relay_url.clone(),
            heartbeat_interval_secs: self.heartbeat_interval_secs,
            reconnect_base_delay_secs: self.reconnect_base_delay_secs,
            reconnect_max_delay_secs: self.reconnect_max_delay_secs,
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }

    pub fn coordinator_config(&self) -> ChattingConfig {
        ChattingConfig {
            ack_timeout_ms: self.ack_timeout_ms,
            ..Default::default()
        }
    }
}
