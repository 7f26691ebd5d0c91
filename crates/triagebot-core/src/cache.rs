//! Small in-process bookkeeping helpers shared by the inbound/outbound
//! filters (§4.1). Grounded on the teacher's `skynet-users::resolver`
//! cache-with-eviction idiom: a `HashMap` plus an insertion-order `Vec` used
//! to evict the oldest half when the cache fills, rather than pulling in a
//! dedicated LRU crate for a bound this small.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Fixed-capacity "seen recently" cache keyed by an arbitrary fingerprint,
/// used by the duplicate-message filter (§4.1).
///
/// When full, the oldest half of entries is evicted — simple and good
/// enough until profiling shows otherwise (same trade-off the teacher makes
/// for its identity cache).
pub struct SeenCache<K> {
    seen: HashMap<K, Instant>,
    order: Vec<K>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone> SeenCache<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashMap::new(),
            order: Vec::new(),
            capacity,
        }
    }

    /// Record `key` as seen `at`. Returns `true` if it was already present
    /// within `window` of `at` (i.e. this is a duplicate).
    pub fn check_and_record(&mut self, key: K, at: Instant, window: Duration) -> bool {
        let is_dup = match self.seen.get(&key) {
            Some(last_seen) => at.duration_since(*last_seen) < window,
            None => false,
        };

        if self.seen.insert(key.clone(), at).is_none() {
            self.order.push(key);
            if self.order.len() > self.capacity {
                let evict_count = self.capacity / 2;
                let evicted: Vec<K> = self.order.drain(0..evict_count).collect();
                for k in evicted {
                    self.seen.remove(&k);
                }
            }
        }

        is_dup
    }
}

/// Per-key sliding-window counter used by the inbound per-sender and
/// outbound per-destination rate limits (§4.1, §8 invariant 7).
pub struct SlidingWindowLimiter<K> {
    hits: HashMap<K, Vec<Instant>>,
    window: Duration,
    max_hits: u32,
}

impl<K: Eq + Hash + Clone> SlidingWindowLimiter<K> {
    pub fn new(window: Duration, max_hits: u32) -> Self {
        Self {
            hits: HashMap::new(),
            window,
            max_hits,
        }
    }

    /// Record a hit for `key` at `now`, pruning entries older than the
    /// window. Returns `true` if this hit is within the limit (i.e. should
    /// be allowed), `false` if it would exceed `max_hits` and must be
    /// dropped/rejected.
    pub fn try_acquire(&mut self, key: K, now: Instant) -> bool {
        let entry = self.hits.entry(key).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);

        if entry.len() as u32 >= self.max_hits {
            return false;
        }

        entry.push(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seen_cache_detects_duplicate_within_window() {
        let mut cache = SeenCache::new(16);
        let t0 = Instant::now();
        assert!(!cache.check_and_record("a", t0, Duration::from_secs(5)));
        assert!(cache.check_and_record("a", t0 + Duration::from_secs(1), Duration::from_secs(5)));
    }

    #[test]
    fn seen_cache_allows_after_window_elapses() {
        let mut cache = SeenCache::new(16);
        let t0 = Instant::now();
        assert!(!cache.check_and_record("a", t0, Duration::from_secs(5)));
        assert!(!cache.check_and_record("a", t0 + Duration::from_secs(6), Duration::from_secs(5)));
    }

    #[test]
    fn sliding_window_limiter_enforces_cap() {
        let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 3);
        let t0 = Instant::now();
        assert!(limiter.try_acquire("sender", t0));
        assert!(limiter.try_acquire("sender", t0));
        assert!(limiter.try_acquire("sender", t0));
        assert!(!limiter.try_acquire("sender", t0));
    }

    #[test]
    fn sliding_window_limiter_prunes_old_hits() {
        let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 1);
        let t0 = Instant::now();
        assert!(limiter.try_acquire("sender", t0));
        assert!(!limiter.try_acquire("sender", t0 + Duration::from_secs(30)));
        assert!(limiter.try_acquire("sender", t0 + Duration::from_secs(61)));
    }
}
