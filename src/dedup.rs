//! Fingerprint / Dedup Cache (spec §4.2): at-most-once local delivery and
//! relay via two bounded, LRU-evicting maps.

use crate::lru::BoundedLru;
use crate::message::{Message, MessageId};

/// Result of [`DedupCache::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    FirstSeen,
    Duplicate,
}

/// Point-in-time snapshot for `stats()` (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupStats {
    pub count: usize,
    pub utilization_rate: f64,
}

pub struct DedupCache {
    seen_by_id: BoundedLru<MessageId, u64>,
    seen_by_replay: BoundedLru<([u8; 32], u64), u64>,
}

impl DedupCache {
    pub fn new(n_dedup: usize, n_replay: usize) -> Self {
        Self {
            seen_by_id: BoundedLru::new(n_dedup),
            seen_by_replay: BoundedLru::new(n_replay),
        }
    }

    /// Atomic check-and-insert (spec §4.2). A replay with an identical
    /// `(content_hash, origin_timestamp)` but a different `id` is still
    /// treated as `Duplicate` — this is the id-rewriting replay defense
    /// spec §4.2 calls for.
    pub fn observe(&mut self, message: &Message, now_ms: u64) -> Observation {
        let replay_key = message.replay_key();
        let already_seen = self.seen_by_id.contains_key(&message.id)
            || self.seen_by_replay.contains_key(&replay_key);

        if already_seen {
            return Observation::Duplicate;
        }

        self.seen_by_id.insert(message.id, now_ms);
        self.seen_by_replay.insert(replay_key, now_ms);
        Observation::FirstSeen
    }

    pub fn clear(&mut self) {
        self.seen_by_id.clear();
        self.seen_by_replay.clear();
    }

    /// Reports on the `seen_by_id` map, the primary containment check.
    pub fn stats(&self) -> DedupStats {
        DedupStats {
            count: self.seen_by_id.len(),
            utilization_rate: self.seen_by_id.utilization_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageType, PeerId};
    use bytes::Bytes;
    use uuid::Uuid;

    fn msg(id: Uuid, hash: [u8; 32], ts: u64) -> Message {
        Message {
            id,
            kind: MessageType::Chat,
            source_id: PeerId::new("a"),
            target_id: None,
            origin_timestamp: ts,
            ttl: 5,
            payload: Bytes::from_static(b"hi"),
            content_hash: hash,
        }
    }

    #[test]
    fn first_seen_then_duplicate() {
        let mut cache = DedupCache::new(16, 16);
        let m = msg(Uuid::new_v4(), [1u8; 32], 100);
        assert_eq!(cache.observe(&m, 0), Observation::FirstSeen);
        assert_eq!(cache.observe(&m, 1), Observation::Duplicate);
    }

    #[test]
    fn id_rewrite_replay_is_duplicate() {
        let mut cache = DedupCache::new(16, 16);
        let m1 = msg(Uuid::new_v4(), [2u8; 32], 500);
        assert_eq!(cache.observe(&m1, 0), Observation::FirstSeen);
        let m2 = msg(Uuid::new_v4(), [2u8; 32], 500);
        assert_eq!(cache.observe(&m2, 1), Observation::Duplicate);
    }

    #[test]
    fn different_content_hash_is_first_seen() {
        let mut cache = DedupCache::new(16, 16);
        let m1 = msg(Uuid::new_v4(), [3u8; 32], 500);
        let m2 = msg(Uuid::new_v4(), [4u8; 32], 500);
        assert_eq!(cache.observe(&m1, 0), Observation::FirstSeen);
        assert_eq!(cache.observe(&m2, 0), Observation::FirstSeen);
    }

    #[test]
    fn eviction_then_rereceive_is_first_seen() {
        let mut cache = DedupCache::new(1, 1);
        let m1 = msg(Uuid::new_v4(), [5u8; 32], 1);
        let m2 = msg(Uuid::new_v4(), [6u8; 32], 2);
        assert_eq!(cache.observe(&m1, 0), Observation::FirstSeen);
        assert_eq!(cache.observe(&m2, 0), Observation::FirstSeen);
        // m1 was evicted to make room for m2.
        assert_eq!(cache.observe(&m1, 0), Observation::FirstSeen);
    }

    #[test]
    fn clear_empties_both_maps() {
        let mut cache = DedupCache::new(16, 16);
        let m = msg(Uuid::new_v4(), [7u8; 32], 1);
        cache.observe(&m, 0);
        cache.clear();
        assert_eq!(cache.observe(&m, 0), Observation::FirstSeen);
    }

    #[test]
    fn stats_reports_count_and_utilization() {
        let mut cache = DedupCache::new(4, 4);
        cache.observe(&msg(Uuid::new_v4(), [8u8; 32], 1), 0);
        let stats = cache.stats();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.utilization_rate, 0.25);
    }
}
