//! `signalair-core`: an offline-first, peer-to-peer emergency messaging
//! substrate. This crate implements the mesh messaging core only — wire
//! framing, dedup, flood control, trust scoring, message self-destruct,
//! and priority relay over a pluggable transport. Radio I/O, UI, and
//! persistent settings are the embedding application's concern; see
//! [`transport::Transport`] and [`crypto::CryptoProvider`] for the seams
//! it plugs into.
//!
//! ```no_run
//! use bytes::Bytes;
//! use signalair_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), SignalAirError> {
//! let transport = InMemoryTransport::new();
//! let crypto = Arc::new(DefaultCryptoProvider::new());
//! let mesh = MeshHandle::start(PeerId::new("node-a"), Config::default(), transport, crypto)?;
//!
//! mesh.on_receive(|message| {
//!     println!("received {:?}: {} bytes", message.kind, message.payload.len());
//! });
//!
//! mesh.broadcast(MessageType::Chat, Bytes::from_static(b"hello mesh")).await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod crypto;
pub mod dedup;
pub mod error;
pub mod events;
pub mod lru;
pub mod message;
pub mod peer;
pub mod rate_guard;
pub mod router;
pub mod selfdestruct;
pub mod transport;
pub mod trust;

/// Re-exports of the types most applications need, in one place.
pub mod prelude {
    pub use crate::config::{BanConfig, Config, RateConfig};
    pub use crate::crypto::{CryptoProvider, DefaultCryptoProvider};
    pub use crate::error::{CodecError, ConfigError, CryptoError, SignalAirError, TransportError};
    pub use crate::events::{SecurityEvent, SecurityEventKind, Severity};
    pub use crate::message::{Message, MessageId, MessageType, PeerId};
    pub use crate::router::{MeshHandle, RouterEvent, RouterStats};
    pub use crate::transport::{InMemoryTransport, Transport, TransportEvent};
}
