//! Error types for the narrator core
//!
//! Failure domains:
//! - Backend requests (chat, synthesis, usage)
//! - Audio decoding and playback
//! - Configuration loading
//! - Session state transitions
//!
//! Only [`NarratorError`] reaches callers of the scheduler; everything else is
//! recovered inside a turn.

use crate::session::NarratorState;
use narr_graph::GraphViewError;
use std::path::PathBuf;

/// Main narrator error type
#[derive(Debug, thiserror::Error)]
pub enum NarratorError {
    /// A turn is still thinking or narrating
    #[error("a turn is already in flight")]
    TurnInFlight,

    /// Nothing to send
    #[error("message is empty")]
    EmptyMessage,

    /// Backend request failed
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Graph view failure
    #[error("graph view error: {0}")]
    Graph(#[from] GraphViewError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl NarratorError {
    /// Whether the caller can simply try again
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::TurnInFlight => true,
            Self::Backend(e) => e.is_retryable(),
            Self::EmptyMessage | Self::Graph(_) | Self::Config(_) => false,
        }
    }
}

/// Backend request errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Transport failure
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success status, with the service's `error` text when present
    #[error("service returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error text
        message: String,
    },

    /// Body did not match the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidResponse(_) => false,
        }
    }
}

/// Audio errors
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// Payload could not be decoded
    #[error("audio decode failed: {0}")]
    Decode(String),

    /// Output device or player failed
    #[error("playback failed: {0}")]
    Playback(String),

    /// Synthesis request failed
    #[error("synthesis failed: {0}")]
    Synthesis(#[from] BackendError),

    /// Filesystem failure
    #[error("audio io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Session transition errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Transition not allowed by the state machine
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: NarratorState,
        /// Requested state
        to: NarratorState,
    },
}
