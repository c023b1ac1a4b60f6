//! Error taxonomy for the Edge TTS client.
//!
//! Errors fall into two groups:
//! - **Pre-flight** errors (`Validation`, `Segmentation`, `Config`) are raised
//!   before any network I/O and abort the whole request.
//! - **Session** errors (`SkewAdjustment`, `UnknownResponse`, `UnexpectedResponse`,
//!   `NoAudioReceived`, `Transport`, `ConnectionTimeout`, `Http`) abort the
//!   current segment and propagate to the caller.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the Edge TTS client.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TtsError {
    /// A synthesis parameter or caption threshold failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The input text could not be split under the configured byte limit.
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    /// A 403 response could not be used to correct the local clock.
    #[error("Clock skew adjustment failed: {0}")]
    SkewAdjustment(String),

    /// The service sent a frame or metadata type this client does not know.
    #[error("Unknown response: {0}")]
    UnknownResponse(String),

    /// The service sent a known frame kind with an invalid shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The socket closed before any audio was received.
    #[error("No audio was received between connection and close")]
    NoAudioReceived,

    /// Underlying socket or HTTP transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Connection establishment exceeded the configured timeout.
    #[error("Connection timed out after {0:?}")]
    ConnectionTimeout(Duration),

    /// Non-success HTTP status from the service.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Client configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TtsError {
    /// Returns true for errors raised before any network I/O.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Segmentation(_) | Self::Config(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TtsError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for TtsError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Http {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

/// Result alias used throughout the crate.
pub type TtsResult<T> = Result<T, TtsError>;
