//! The `error` module defines the error types used within `edge-relay`.
//!
//! Every failure in the relay paths is unrecoverable where it is detected:
//! errors are logged, then propagated to the process entry point.

use std::fmt;

use thiserror::Error;

/// The category of event a handler subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Message,
    TwinPatch,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Message => f.write_str("message"),
            EventKind::TwinPatch => f.write_str("twin patch"),
        }
    }
}

/// Errors raised by a transport client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("edge environment variable {0} is not set")]
    Environment(&'static str),

    #[error("invalid edge hub url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to connect to edge hub: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("a {0} handler is already registered")]
    HandlerAlreadyRegistered(EventKind),

    #[error("failed to register {kind} handler: {reason}")]
    Registration { kind: EventKind, reason: String },

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("send {seq} rejected by edge hub: {reason}")]
    Rejected { seq: u64, reason: String },

    #[error("send {seq} was not acknowledged within {timeout_ms} ms")]
    SendTimeout { seq: u64, timeout_ms: u64 },

    #[error("connection to edge hub closed")]
    ConnectionClosed,

    #[error("client has been shut down")]
    Closed,
}

/// Errors that end the outbound relay loop.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to serialize queued payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to send to {output}: {source}")]
    Send {
        output: &'static str,
        #[source]
        source: ClientError,
    },
}

/// Errors surfaced to the process entry point.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("client setup failed: {0}")]
    Setup(#[source] ClientError),

    #[error("relay loop failed: {0}")]
    Relay(#[from] RelayError),

    #[error("relay task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Errors raised while installing the log subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("a global logger is already installed")]
    AlreadyInstalled,
}
