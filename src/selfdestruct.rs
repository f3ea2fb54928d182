//! Self-Destruct Tracker (spec §4.5): per-message lifetime tracking and
//! expiry notification.

use crate::events::{SecurityEvent, SecurityEventKind, Severity};
use crate::message::{MessageId, MessageType};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
struct TrackedEntry {
    created_at_ms: u64,
    kind: MessageType,
    priority: u8,
    /// `None` once expired — spec §4.5 "removes the timestamp, marks
    /// metadata expired=true".
    arrival_ms: Option<u64>,
    expired: bool,
}

pub struct SelfDestructTracker {
    message_lifetime_ms: u64,
    metadata_retention_cap: usize,
    entries: HashMap<MessageId, TrackedEntry>,
    /// Creation order, for `metadata_retention_cap` eviction (spec §4.5:
    /// "evict oldest by creation time").
    creation_order: VecDeque<MessageId>,
}

impl SelfDestructTracker {
    pub fn new(message_lifetime_ms: u64, metadata_retention_cap: usize) -> Self {
        Self {
            message_lifetime_ms,
            metadata_retention_cap,
            entries: HashMap::new(),
            creation_order: VecDeque::new(),
        }
    }

    pub fn track(&mut self, id: MessageId, kind: MessageType, priority: u8, now_ms: u64) {
        if self.entries.contains_key(&id) {
            return;
        }
        self.entries.insert(
            id,
            TrackedEntry {
                created_at_ms: now_ms,
                kind,
                priority,
                arrival_ms: Some(now_ms),
                expired: false,
            },
        );
        self.creation_order.push_back(id);
    }

    pub fn untrack(&mut self, id: &MessageId) {
        self.entries.remove(id);
        self.creation_order.retain(|existing| existing != id);
    }

    pub fn is_expired(&self, id: &MessageId) -> bool {
        self.entries.get(id).map_or(false, |e| e.expired)
    }

    /// `None` if the message isn't tracked or has already expired.
    pub fn time_remaining_ms(&self, id: &MessageId, now_ms: u64) -> Option<u64> {
        let entry = self.entries.get(id)?;
        let arrival = entry.arrival_ms?;
        let deadline = arrival + self.message_lifetime_ms;
        Some(deadline.saturating_sub(now_ms))
    }

    /// Scans tracked entries, expiring any older than `message_lifetime`
    /// and emitting a `MessageExpired` event per newly-expired entry.
    /// Idempotent: already-expired entries are skipped. After sweeping,
    /// evicts oldest-by-creation metadata past `metadata_retention_cap`.
    pub fn sweep(&mut self, now_ms: u64) -> Vec<SecurityEvent> {
        let mut events = Vec::new();
        for id in self.creation_order.iter() {
            if let Some(entry) = self.entries.get_mut(id) {
                if entry.expired {
                    continue;
                }
                let Some(arrival) = entry.arrival_ms else {
                    continue;
                };
                if now_ms.saturating_sub(arrival) >= self.message_lifetime_ms {
                    entry.arrival_ms = None;
                    entry.expired = true;
                    events.push(SecurityEvent::new(
                        SecurityEventKind::MessageExpired,
                        None,
                        Severity::Info,
                        format!("message {id} expired ({:?})", entry.kind),
                    ));
                }
            }
        }

        while self.creation_order.len() > self.metadata_retention_cap {
            if let Some(oldest) = self.creation_order.pop_front() {
                self.entries.remove(&oldest);
            }
        }

        events
    }

    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn time_remaining_decreases_monotonically() {
        let mut tracker = SelfDestructTracker::new(1000, 100);
        let id = Uuid::new_v4();
        tracker.track(id, MessageType::Chat, 1, 0);
        let r0 = tracker.time_remaining_ms(&id, 0).unwrap();
        let r1 = tracker.time_remaining_ms(&id, 500).unwrap();
        assert!(r1 < r0);
    }

    #[test]
    fn sweep_expires_after_lifetime_and_fires_once() {
        let mut tracker = SelfDestructTracker::new(1000, 100);
        let id = Uuid::new_v4();
        tracker.track(id, MessageType::Chat, 1, 0);

        assert!(!tracker.is_expired(&id));
        let events = tracker.sweep(1100);
        assert_eq!(events.len(), 1);
        assert!(tracker.is_expired(&id));

        let events = tracker.sweep(1200);
        assert!(events.is_empty(), "sweep must not re-expire the same entry");
    }

    #[test]
    fn untrack_removes_entry_immediately() {
        let mut tracker = SelfDestructTracker::new(1000, 100);
        let id = Uuid::new_v4();
        tracker.track(id, MessageType::Chat, 1, 0);
        tracker.untrack(&id);
        assert_eq!(tracker.tracked_count(), 0);
        assert!(tracker.time_remaining_ms(&id, 0).is_none());
    }

    #[test]
    fn metadata_retention_cap_evicts_oldest() {
        let mut tracker = SelfDestructTracker::new(10, 2);
        let ids: Vec<_> = (0..3).map(|_| Uuid::new_v4()).collect();
        for (i, id) in ids.iter().enumerate() {
            tracker.track(*id, MessageType::Chat, 1, i as u64);
        }
        tracker.sweep(100);
        assert_eq!(tracker.tracked_count(), 2);
        assert!(tracker.time_remaining_ms(&ids[0], 100).is_none());
    }

    #[test]
    fn sweep_is_idempotent_and_manual_safe() {
        let mut tracker = SelfDestructTracker::new(1000, 100);
        let id = Uuid::new_v4();
        tracker.track(id, MessageType::Chat, 1, 0);
        tracker.sweep(2000);
        tracker.sweep(2000);
        tracker.sweep(2000);
        assert!(tracker.is_expired(&id));
    }
}
