// crates/client-lib/src/error.rs

//! Central error type for the real-time client.
//!
//! Lifecycle calls on the connection manager never surface these; they are
//! used by transports, settings loading and the collaborator boundary.
use thiserror::Error;

/// Real-time client error types with stable error codes
#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("No tokio runtime available")]
    NoRuntime,

    #[error("Collaborator call failed: {0}")]
    Collaborator(String),
}

impl RealtimeError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            RealtimeError::Transport(_) => "TRN_001",
            RealtimeError::Handshake(_) => "TRN_002",
            RealtimeError::Json(_) => "JSON_001",
            RealtimeError::Config(_) => "CFG_001",
            RealtimeError::InvalidSettings(_) => "CFG_002",
            RealtimeError::NoRuntime => "RT_001",
            RealtimeError::Collaborator(_) => "SVC_001",
        }
    }

    /// Whether retrying the same operation later can succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RealtimeError::Transport(_) | RealtimeError::Handshake(_) | RealtimeError::Collaborator(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RealtimeError::Transport(err.to_string())
    }
}

impl From<anyhow::Error> for RealtimeError {
    fn from(err: anyhow::Error) -> Self {
        RealtimeError::Collaborator(format!("{err:#}"))
    }
}
