// src/error.rs
//! Typed error taxonomy for the acquisition core.
//!
//! Every public session operation fails with one of the error types below,
//! carrying enough context (target address, request kind, elapsed time) to
//! render an actionable message. Wire-level `ProtocolError`s never escape the
//! codec layer; they are logged and the offending message is dropped.

use crate::hal::types::SessionState;
use thiserror::Error;

/// Low-level failures reported by a transport adapter.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("failed to open {target}: {reason}")]
    OpenFailed { target: String, reason: String },

    #[error("handshake with {target} timed out after {elapsed_ms} ms")]
    HandshakeTimeout { target: String, elapsed_ms: u64 },

    #[error("handshake with {target} refused: {reason}")]
    HandshakeRefused { target: String, reason: String },

    #[error("no acknowledgment for {request} within {elapsed_ms} ms")]
    AckTimeout { request: &'static str, elapsed_ms: u64 },

    #[error("{request} was rejected by the device")]
    NegativeAck { request: &'static str },

    #[error("a {request} request is already in flight")]
    RequestInFlight { request: &'static str },

    #[error("invalid transport configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String },

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by `DeviceSession::configure` and configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sampling rate must be positive, got {0}")]
    InvalidRate(f64),

    #[error("configure is not allowed while {state:?}")]
    InvalidState { state: SessionState },

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("configuration parse error: {0}")]
    Parse(String),

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },

    #[error("i/o failure reading configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by `DeviceSession::connect`.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error("connect is not allowed while {state:?}")]
    InvalidState { state: SessionState },

    #[error("no sensor configuration applied before connect")]
    NotConfigured,

    #[error("handshake with {target} timed out after {elapsed_ms} ms")]
    HandshakeTimeout { target: String, elapsed_ms: u64 },

    #[error("connecting to {target} failed: {source}")]
    Transport {
        target: String,
        #[source]
        source: TransportError,
    },
}

/// Soft failure: the relay never confirmed the device subscription within the
/// retry budget. Streaming may still be attempted afterwards.
#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("device {address} not confirmed after {attempts} open attempts")]
    NotConfirmed { address: String, attempts: u32 },
}

/// Errors raised by `DeviceSession::start_streaming` / `stop_streaming`.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("streaming is not allowed while {state:?}")]
    InvalidState { state: SessionState },

    #[error("no acknowledgment for {request} within {elapsed_ms} ms")]
    AckTimeout { request: &'static str, elapsed_ms: u64 },

    #[error("{request} was rejected by the device")]
    NegativeAck { request: &'static str },

    #[error("streaming failed on {target}: {source}")]
    Transport {
        target: String,
        #[source]
        source: TransportError,
    },
}

/// Errors raised by `DeviceSession::apply_sampling_rate`.
#[derive(Debug, Error)]
pub enum RateError {
    #[error("sampling rate must be positive, got {0}")]
    InvalidRate(f64),

    #[error("rate change is not allowed while {state:?}")]
    InvalidState { state: SessionState },

    #[error("no acknowledgment for {request} within {elapsed_ms} ms")]
    AckTimeout { request: &'static str, elapsed_ms: u64 },

    #[error("rate change failed on {target}: {source}")]
    Transport {
        target: String,
        #[source]
        source: TransportError,
    },
}

/// Malformed wire traffic. Recovered locally by dropping the message; never
/// surfaced through the public API.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed wire message: {0}")]
    Malformed(String),

    #[error("wire message is missing its type discriminator")]
    MissingType,

    #[error("unexpected payload for {kind}: {reason}")]
    Payload { kind: String, reason: String },
}

/// Umbrella error for callers that want a single error type.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnError),

    #[error(transparent)]
    Subscribe(#[from] SubscribeError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Rate(#[from] RateError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result alias for umbrella-typed operations.
pub type SessionResult<T> = Result<T, SessionError>;

impl ConnError {
    /// Wrap a transport failure, promoting handshake timeouts to their own
    /// variant so callers can distinguish "relay silent" from "socket broken".
    pub(crate) fn from_transport(target: &str, source: TransportError) -> Self {
        match source {
            TransportError::HandshakeTimeout { target, elapsed_ms } => {
                ConnError::HandshakeTimeout { target, elapsed_ms }
            }
            source => ConnError::Transport {
                target: target.to_string(),
                source,
            },
        }
    }
}

impl StreamError {
    pub(crate) fn from_transport(target: &str, source: TransportError) -> Self {
        match source {
            TransportError::AckTimeout { request, elapsed_ms } => {
                StreamError::AckTimeout { request, elapsed_ms }
            }
            TransportError::NegativeAck { request } => StreamError::NegativeAck { request },
            source => StreamError::Transport {
                target: target.to_string(),
                source,
            },
        }
    }
}

impl RateError {
    pub(crate) fn from_transport(target: &str, source: TransportError) -> Self {
        match source {
            TransportError::AckTimeout { request, elapsed_ms } => {
                RateError::AckTimeout { request, elapsed_ms }
            }
            source => RateError::Transport {
                target: target.to_string(),
                source,
            },
        }
    }
}
