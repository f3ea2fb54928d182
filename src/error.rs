//! Typed errors for every seam the core exposes (spec §7).
//!
//! Framing, transport and policy failures never reach the application as
//! an `Err` — they are absorbed and surfaced only through the
//! [`crate::events::SecurityEvent`] stream. `SignalAirError` is reserved
//! for the handful of application-facing, synchronous failure modes
//! (sending after `stop()`, oversize payload, bad configuration).

use thiserror::Error;

/// Failures raised while decoding a wire frame (spec §4.1).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),
    #[error("payload of {actual} bytes exceeds max_data_packet_size of {max}")]
    PayloadTooLarge { actual: usize, max: usize },
    #[error("content_hash does not match payload")]
    HashMismatch,
    #[error("unknown message type byte: {0}")]
    UnknownType(u8),
}

/// Failures raised while validating a [`crate::config::Config`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: i64 },
    #[error("{field} must be non-empty")]
    Empty { field: &'static str },
}

/// Failures surfaced by a [`crate::transport::Transport`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("send to peer failed: {0}")]
    SendFailed(String),
    #[error("operation timed out")]
    Timeout,
    #[error("peer is not connected")]
    NotConnected,
}

/// Failures surfaced by a [`crate::crypto::CryptoProvider`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("authentication failed during decrypt")]
    AuthFailed,
    #[error("invalid key or nonce length")]
    InvalidKeyMaterial,
}

/// Application-facing error surface (spec §7 "Application-initiated errors").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignalAirError {
    #[error("router has been stopped")]
    Stopped,
    #[error("payload of {actual} bytes exceeds max_data_packet_size of {max}")]
    PayloadTooLarge { actual: usize, max: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}
