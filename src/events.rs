//! Observability: the non-blocking `SecurityEvent` stream (spec §6).

use crate::message::PeerId;
use chrono::{DateTime, Utc};

/// The kind of security-relevant occurrence being reported (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEventKind {
    MalformedFrame,
    Duplicate,
    RateExceeded,
    Suspicious,
    Banned,
    PeerJoined,
    PeerLeft,
    MessageExpired,
    TransportError,
}

/// Coarse severity, used by consumers to filter/prioritize the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One entry on the security-event bus (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEvent {
    pub at: DateTime<Utc>,
    pub kind: SecurityEventKind,
    pub peer: Option<PeerId>,
    pub severity: Severity,
    pub detail: String,
}

impl SecurityEvent {
    pub fn new(
        kind: SecurityEventKind,
        peer: Option<PeerId>,
        severity: Severity,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            at: Utc::now(),
            kind,
            peer,
            severity,
            detail: detail.into(),
        }
    }
}

/// Capacity of the broadcast channel backing the security-event stream.
/// Consumers lagging behind this many events drop the oldest ones they
/// missed (spec §6: "consumers may drop events when the channel
/// overflows"), which is exactly `tokio::sync::broadcast`'s documented
/// lagging-receiver behavior.
pub const SECURITY_EVENT_CHANNEL_CAPACITY: usize = 1024;
