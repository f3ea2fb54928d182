//! Peer record and neighbor set (spec §3 "Peer record", "Neighbor set").
//!
//! The rate/trust/dedup state per peer lives in their own components
//! (`RateGuard`, `TrustLedger`); `PeerRecord` here only tracks what the
//! router itself needs: connection state and liveness.

use crate::message::PeerId;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub state: ConnectionState,
    pub last_seen_ms: u64,
}

/// The set of currently connected peers, bounded by `max_connections`
/// (spec §3, §6).
pub struct NeighborSet {
    peers: HashMap<PeerId, PeerRecord>,
    max_connections: usize,
}

impl NeighborSet {
    pub fn new(max_connections: usize) -> Self {
        Self {
            peers: HashMap::new(),
            max_connections,
        }
    }

    /// Registers a newly-connected peer. Returns `false` (and does not
    /// register) if the neighbor set is already at `max_connections`.
    pub fn connect(&mut self, peer: PeerId, now_ms: u64) -> bool {
        if !self.peers.contains_key(&peer) && self.peers.len() >= self.max_connections {
            return false;
        }
        self.peers.insert(
            peer,
            PeerRecord {
                state: ConnectionState::Connected,
                last_seen_ms: now_ms,
            },
        );
        true
    }

    pub fn disconnect(&mut self, peer: &PeerId) {
        if let Some(record) = self.peers.get_mut(peer) {
            record.state = ConnectionState::Disconnected;
        }
    }

    /// Removes a peer's record outright (spec §3 Lifecycle: "destroyed
    /// when the ban ledger and trust ledger both prune them").
    pub fn remove(&mut self, peer: &PeerId) {
        self.peers.remove(peer);
    }

    pub fn touch(&mut self, peer: &PeerId, now_ms: u64) {
        if let Some(record) = self.peers.get_mut(peer) {
            record.last_seen_ms = now_ms;
        }
    }

    pub fn is_connected(&self, peer: &PeerId) -> bool {
        self.peers
            .get(peer)
            .map_or(false, |r| r.state == ConnectionState::Connected)
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|(_, r)| r.state == ConnectionState::Connected)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Peers that have not been heard from (including heartbeats) for
    /// longer than `peer_timeout` (spec §4.6 "Heartbeat").
    pub fn timed_out_peers(&self, now_ms: u64, peer_timeout_ms: u64) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|(_, r)| {
                r.state == ConnectionState::Connected
                    && now_ms.saturating_sub(r.last_seen_ms) > peer_timeout_ms
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_respects_max_connections() {
        let mut set = NeighborSet::new(1);
        assert!(set.connect(PeerId::new("a"), 0));
        assert!(!set.connect(PeerId::new("b"), 0));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn timed_out_peers_reported_after_peer_timeout() {
        let mut set = NeighborSet::new(10);
        set.connect(PeerId::new("a"), 0);
        assert!(set.timed_out_peers(30_001, 30_000).contains(&PeerId::new("a")));
        assert!(set.timed_out_peers(30_000, 30_000).is_empty());
    }

    #[test]
    fn touch_resets_timeout_clock() {
        let mut set = NeighborSet::new(10);
        set.connect(PeerId::new("a"), 0);
        set.touch(&PeerId::new("a"), 20_000);
        assert!(set.timed_out_peers(40_000, 30_000).is_empty());
    }
}
