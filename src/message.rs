//! Wire-level data model (spec §3): the `Message` type, its type/priority
//! enumeration, and peer identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Globally-unique message identifier (spec §3: "128-bit ... UUID-class").
pub type MessageId = Uuid;

/// Ephemeral, transport-assigned peer identity (spec §6: "opaque string").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Message kind (spec §3). Each variant has a fixed wire value and a fixed
/// relay priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    EmergencyMedical = 0,
    EmergencyDanger = 1,
    Signal = 2,
    Chat = 3,
    Game = 4,
    System = 5,
    KeyExchange = 6,
}

impl MessageType {
    /// Relay/queue priority, higher dispatches first (spec §3, §4.6).
    pub fn priority(self) -> u8 {
        match self {
            MessageType::EmergencyMedical
            | MessageType::EmergencyDanger
            | MessageType::KeyExchange => 3,
            MessageType::Signal | MessageType::System => 2,
            MessageType::Chat | MessageType::Game => 1,
        }
    }

    /// Whether this type is eligible for the emergency admission bypass
    /// (spec §4.3; `system` heartbeats are excluded structurally, see
    /// DESIGN.md Open Question 2 — heartbeats never enter `admit()` at all).
    pub fn is_emergency_bypass_eligible(self) -> bool {
        matches!(
            self,
            MessageType::EmergencyMedical
                | MessageType::EmergencyDanger
                | MessageType::KeyExchange
                | MessageType::System
        )
    }

    pub(crate) fn from_wire(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => MessageType::EmergencyMedical,
            1 => MessageType::EmergencyDanger,
            2 => MessageType::Signal,
            3 => MessageType::Chat,
            4 => MessageType::Game,
            5 => MessageType::System,
            6 => MessageType::KeyExchange,
            _ => return None,
        })
    }

    pub(crate) fn to_wire(self) -> u8 {
        self as u8
    }
}

/// The atomic unit on the wire and in memory (spec §3). Immutable once
/// framed: relays construct a new `Message` with a decremented `ttl`
/// rather than mutating one in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub kind: MessageType,
    pub source_id: PeerId,
    pub target_id: Option<PeerId>,
    pub origin_timestamp: u64,
    pub ttl: u8,
    pub payload: bytes::Bytes,
    pub content_hash: [u8; 32],
}

impl Message {
    /// The relay fan-out/outbound-queue priority for this message.
    pub fn priority(&self) -> u8 {
        self.kind.priority()
    }

    /// A copy of this message with `ttl` decremented by one, for relay.
    /// Panics if `ttl` is already zero (callers must check `ttl > 1`
    /// before relaying, per spec §4.6 step 5).
    pub fn relayed(&self) -> Message {
        assert!(self.ttl > 0, "relayed() called on a message with ttl=0");
        Message {
            ttl: self.ttl - 1,
            ..self.clone()
        }
    }

    /// Replay-protection key used by the dedup cache's second map
    /// (spec §4.2): `(content_hash, origin_timestamp)`.
    pub fn replay_key(&self) -> ([u8; 32], u64) {
        (self.content_hash, self.origin_timestamp)
    }
}
