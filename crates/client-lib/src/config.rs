// ============================
// realtime-client/src/config.rs
// ============================
//! Configuration management.
//!
//! Settings come from built-in defaults, then an optional TOML file, then
//! environment variables such as `REALTIME__TRANSPORT__HANDSHAKE_TIMEOUT_MS`.
use crate::error::RealtimeError;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default config file looked up by [`Settings::load`]
pub const DEFAULT_CONFIG_FILE: &str = "realtime.toml";

const ENV_PREFIX: &str = "REALTIME";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Socket endpoints and handshake
    pub transport: TransportSettings,
    /// Reconnect policy after a lost transport
    pub reconnect: ReconnectSettings,
    /// Envelope fan-out to mount points
    pub dispatch: DispatchSettings,
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
}

/// Transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// WebSocket endpoints, tried in order until one accepts the socket
    pub endpoints: Vec<String>,
    /// Time allowed between opening the socket and `Connected`
    pub handshake_timeout_ms: u64,
    /// Bearer token forwarded in the `Connect` frame
    pub auth_token: Option<String>,
}

/// Exponential backoff for reconnect attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub enabled: bool,
    /// Maximum number of consecutive attempts (0 = unlimited)
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

/// Dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Envelopes buffered per mount point before the slowest one lags
    pub event_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transport: TransportSettings::default(),
            reconnect: ReconnectSettings::default(),
            dispatch: DispatchSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            endpoints: vec!["ws://127.0.0.1:8080/ws".to_string()],
            handshake_timeout_ms: 5_000,
            auth_token: None,
        }
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 10,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 1.5,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self { event_buffer: 64 }
    }
}

impl TransportSettings {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl ReconnectSettings {
    /// Delay before attempt number `attempt` (zero-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = delay.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Whether another attempt is allowed after `attempts_made` failures
    pub fn allows_attempt(&self, attempts_made: u32) -> bool {
        self.enabled && (self.max_attempts == 0 || attempts_made < self.max_attempts)
    }
}

impl Settings {
    /// Load settings from `realtime.toml` (if present) and the environment
    pub fn load() -> Result<Self, RealtimeError> {
        Self::build(File::with_name(DEFAULT_CONFIG_FILE).required(false))
    }

    /// Load settings from an explicit file, which must exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, RealtimeError> {
        Self::build(File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self, RealtimeError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("transport.endpoints"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the client cannot run with
    pub fn validate(&self) -> Result<(), RealtimeError> {
        if self.transport.endpoints.is_empty() {
            return Err(RealtimeError::InvalidSettings(
                "at least one transport endpoint is required".to_string(),
            ));
        }
        if let Some(bad) = self
            .transport
            .endpoints
            .iter()
            .find(|url| !(url.starts_with("ws://") || url.starts_with("wss://")))
        {
            return Err(RealtimeError::InvalidSettings(format!(
                "endpoint `{bad}` is not a ws:// or wss:// URL"
            )));
        }
        if self.transport.handshake_timeout_ms == 0 {
            return Err(RealtimeError::InvalidSettings(
                "handshake_timeout_ms must be positive".to_string(),
            ));
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(RealtimeError::InvalidSettings(
                "reconnect.multiplier must be at least 1.0".to_string(),
            ));
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(RealtimeError::InvalidSettings(
                "reconnect.initial_delay_ms exceeds max_delay_ms".to_string(),
            ));
        }
        if self.dispatch.event_buffer == 0 {
            return Err(RealtimeError::InvalidSettings(
                "dispatch.event_buffer must be positive".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(RealtimeError::InvalidSettings(format!(
                "unknown log level `{}`",
                self.log_level
            )));
        }
        Ok(())
    }
}
