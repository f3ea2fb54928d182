//! The transport seam (spec §6): byte-oriented, message-framed,
//! unreliable, peer-tagged. Session discovery, connect/disconnect
//! detection and raw byte I/O are the embedding application's concern;
//! the core only consumes this trait.

use crate::error::TransportError;
use crate::message::PeerId;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One occurrence on the transport's event stream (spec §6).
#[derive(Debug, Clone)]
pub enum TransportEvent {
    PeerConnected(PeerId),
    PeerDisconnected(PeerId),
    BytesReceived(PeerId, Bytes),
}

/// A pluggable radio transport. The router drives this trait; it never
/// assumes anything about the underlying medium (spec §1 "Out of
/// scope").
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, peer: &PeerId, bytes: Bytes) -> Result<(), TransportError>;

    /// Hands the router a receiver for this transport's event stream.
    /// Called once by `MeshRouter::start`.
    fn subscribe(&self) -> mpsc::Receiver<TransportEvent>;
}

/// An in-process transport double used by tests and
/// `signalair-harness`. Peers are connected/disconnected and frames are
/// delivered by calling methods directly rather than over real radio
/// I/O, but the ordering and at-least-once connect/disconnect delivery
/// contract of spec §6 still holds.
pub struct InMemoryTransport {
    event_tx: mpsc::Sender<TransportEvent>,
    event_rx: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
    sent: Arc<Mutex<VecDeque<(PeerId, Bytes)>>>,
    fail_sends_to: Arc<Mutex<Vec<PeerId>>>,
}

impl InMemoryTransport {
    pub fn new() -> Arc<Self> {
        let (event_tx, event_rx) = mpsc::channel(1024);
        Arc::new(Self {
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            sent: Arc::new(Mutex::new(VecDeque::new())),
            fail_sends_to: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub async fn connect(&self, peer: PeerId) {
        let _ = self.event_tx.send(TransportEvent::PeerConnected(peer)).await;
    }

    pub async fn disconnect(&self, peer: PeerId) {
        let _ = self.event_tx.send(TransportEvent::PeerDisconnected(peer)).await;
    }

    pub async fn deliver(&self, from: PeerId, bytes: Bytes) {
        let _ = self
            .event_tx
            .send(TransportEvent::BytesReceived(from, bytes))
            .await;
    }

    /// Frames the test harness has observed leaving via `send`.
    pub fn sent_frames(&self) -> Vec<(PeerId, Bytes)> {
        self.sent.lock().unwrap().iter().cloned().collect()
    }

    pub fn drain_sent(&self) -> Vec<(PeerId, Bytes)> {
        self.sent.lock().unwrap().drain(..).collect()
    }

    /// Makes `send` fail for a given peer until cleared, to exercise
    /// the router's retry/backoff path (spec §4.6, §7).
    pub fn fail_sends_to(&self, peer: PeerId) {
        self.fail_sends_to.lock().unwrap().push(peer);
    }

    pub fn clear_failures(&self) {
        self.fail_sends_to.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, peer: &PeerId, bytes: Bytes) -> Result<(), TransportError> {
        if self.fail_sends_to.lock().unwrap().contains(peer) {
            return Err(TransportError::SendFailed(format!(
                "simulated failure for {peer}"
            )));
        }
        self.sent.lock().unwrap().push_back((peer.clone(), bytes));
        Ok(())
    }

    fn subscribe(&self) -> mpsc::Receiver<TransportEvent> {
        self.event_rx
            .lock()
            .unwrap()
            .take()
            .expect("InMemoryTransport::subscribe called more than once")
    }
}
