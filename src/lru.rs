//! A small bounded, insertion-order-evicting map shared by the dedup
//! cache and the rate/flood guard's per-peer table (spec §4.2, §5:
//! "LRU-evicted on overflow"). Backed by a `HashMap` plus a `VecDeque`
//! tracking insertion order, in the style the retrieved mesh-networking
//! corpus uses for bounded per-key state (an order ring alongside a map,
//! rather than a pulled-in `lru` crate) — the access pattern here is
//! insert-once/read-many, not touch-to-promote, so plain FIFO eviction
//! on overflow is the right fit.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

pub struct BoundedLru<K, V> {
    capacity: usize,
    map: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K, V> BoundedLru<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedLru capacity must be positive");
        Self {
            capacity,
            map: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.map.get_mut(key)
    }

    /// Inserts a key/value, evicting the oldest entry if at capacity.
    /// Returns the evicted entry, if any. Re-inserting an existing key
    /// updates its value without changing its position in the order ring.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.map.contains_key(&key) {
            self.map.insert(key, value);
            return None;
        }
        let evicted = if self.map.len() >= self.capacity {
            self.order.pop_front().map(|oldest| {
                let v = self.map.remove(&oldest).expect("order/map out of sync");
                (oldest, v)
            })
        } else {
            None
        };
        self.order.push_back(key.clone());
        self.map.insert(key, value);
        evicted
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.map.remove(key);
        if value.is_some() {
            self.order.retain(|k| k != key);
        }
        value
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.map.iter()
    }

    /// Fraction of capacity currently used, in `[0.0, 1.0]`.
    pub fn utilization_rate(&self) -> f64 {
        self.map.len() as f64 / self.capacity as f64
    }

    /// Retains only entries for which `f` returns true, keeping the
    /// order ring in sync.
    pub fn retain(&mut self, mut f: impl FnMut(&K, &V) -> bool) {
        let map = &mut self.map;
        self.order.retain(|k| match map.get(k) {
            Some(v) => f(k, v),
            None => false,
        });
        map.retain(|k, v| f(k, v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_on_overflow() {
        let mut lru: BoundedLru<u32, &str> = BoundedLru::new(2);
        assert!(lru.insert(1, "a").is_none());
        assert!(lru.insert(2, "b").is_none());
        let evicted = lru.insert(3, "c");
        assert_eq!(evicted, Some((1, "a")));
        assert!(!lru.contains_key(&1));
        assert!(lru.contains_key(&2));
        assert!(lru.contains_key(&3));
    }

    #[test]
    fn reinsert_does_not_evict() {
        let mut lru: BoundedLru<u32, u32> = BoundedLru::new(2);
        lru.insert(1, 10);
        lru.insert(2, 20);
        assert!(lru.insert(1, 11).is_none());
        assert_eq!(lru.get(&1), Some(&11));
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn evicted_and_rereceived_is_first_seen_again() {
        let mut lru: BoundedLru<u32, ()> = BoundedLru::new(1);
        lru.insert(1, ());
        lru.insert(2, ());
        assert!(!lru.contains_key(&1));
        lru.insert(1, ());
        assert!(lru.contains_key(&1));
    }

    #[test]
    fn utilization_rate_reports_fraction_full() {
        let mut lru: BoundedLru<u32, ()> = BoundedLru::new(4);
        lru.insert(1, ());
        assert_eq!(lru.utilization_rate(), 0.25);
    }
}
