//! Fixed-capacity associative cache with a pluggable eviction policy and a
//! shared TTL, maintaining three agreeing views of membership: by key, by
//! use counter, and by expiration order.

pub mod error;

pub use error::CacheError;

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Eviction policy applied when `add` would exceed `max_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Evict the entry with the lowest use counter (least recently used).
    Lru,
    /// Evict the entry with the highest use counter (most recently used).
    Mru,
    /// Evict the first entry in iteration order, independent of use.
    Random,
}

struct Item<V> {
    value: V,
    use_counter: u64,
    expires_at: Instant,
}

/// A fixed-capacity cache. Every mutation first evicts anything whose TTL
/// has elapsed, then applies `algorithm` if still over `max_size`.
pub struct Cache<K, V> {
    algorithm: Algorithm,
    max_size: usize,
    ttl: Duration,
    items: HashMap<K, Item<V>>,
    by_use: BTreeMap<u64, K>,
    by_expiration: BTreeMap<(Instant, u64), K>,
    next_use: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> Cache<K, V> {
    pub fn new(algorithm: Algorithm, max_size: usize, ttl: Duration) -> Result<Self, CacheError> {
        if max_size == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        Ok(Self {
            algorithm,
            max_size,
            ttl,
            items: HashMap::new(),
            by_use: BTreeMap::new(),
            by_expiration: BTreeMap::new(),
            next_use: 0,
        })
    }

    pub fn size(&self) -> usize {
        debug_assert_eq!(self.items.len(), self.by_use.len());
        debug_assert_eq!(self.items.len(), self.by_expiration.len());
        self.items.len()
    }

    fn next_use(&mut self) -> u64 {
        let use_counter = self.next_use;
        self.next_use += 1;
        use_counter
    }

    fn expire(&mut self) {
        let now = Instant::now();
        let expired: Vec<(Instant, u64)> = self
            .by_expiration
            .range(..(now, u64::MAX))
            .map(|(k, _)| *k)
            .collect();
        for key in expired {
            if let Some(k) = self.by_expiration.remove(&key) {
                self.remove_entry(&k);
            }
        }
    }

    fn remove_entry(&mut self, key: &K) -> Option<V> {
        let item = self.items.remove(key)?;
        self.by_use.remove(&item.use_counter);
        self.by_expiration.remove(&(item.expires_at, item.use_counter));
        Some(item.value)
    }

    fn evict_one(&mut self) {
        let victim = match self.algorithm {
            Algorithm::Lru => self.by_use.iter().next().map(|(_, k)| k.clone()),
            Algorithm::Mru => self.by_use.iter().next_back().map(|(_, k)| k.clone()),
            Algorithm::Random => self.items.keys().next().cloned(),
        };
        if let Some(key) = victim {
            self.remove_entry(&key);
        }
    }

    /// Insert `key`/`value`. If `key` already exists and `replace` is
    /// `false`, leaves the cache untouched and returns `false`.
    pub fn add(&mut self, key: K, value: V, replace: bool) -> bool {
        self.expire();

        if self.items.contains_key(&key) {
            if !replace {
                return false;
            }
            self.remove_entry(&key);
        }

        if self.items.len() >= self.max_size {
            self.evict_one();
        }

        let use_counter = self.next_use();
        let expires_at = Instant::now() + self.ttl;
        self.by_use.insert(use_counter, key.clone());
        self.by_expiration.insert((expires_at, use_counter), key.clone());
        self.items.insert(
            key,
            Item {
                value,
                use_counter,
                expires_at,
            },
        );
        true
    }

    /// Fetch `key`, refreshing its use counter (relevant to LRU/MRU).
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.expire();
        let item = self.items.get(key)?;
        let old_use = item.use_counter;
        let expires_at = item.expires_at;
        let value = item.value.clone();

        let new_use = self.next_use();
        self.by_use.remove(&old_use);
        self.by_expiration.remove(&(expires_at, old_use));
        self.by_use.insert(new_use, key.clone());
        self.by_expiration.insert((expires_at, new_use), key.clone());
        if let Some(item) = self.items.get_mut(key) {
            item.use_counter = new_use;
        }
        Some(value)
    }

    /// Remove and return `key`'s value, if present.
    pub fn pop(&mut self, key: &K) -> Option<V> {
        self.expire();
        self.remove_entry(key)
    }

    pub fn del(&mut self, key: &K) {
        self.pop(key);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.by_use.clear();
        self.by_expiration.clear();
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn lru_evicts_least_recently_used() {
        let mut cache: Cache<&str, i32> = Cache::new(Algorithm::Lru, 2, Duration::from_secs(60)).unwrap();
        cache.add("a", 1, true);
        cache.add("b", 2, true);
        cache.get(&"a");
        cache.add("c", 3, true);

        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn mru_evicts_most_recently_used() {
        let mut cache: Cache<&str, i32> = Cache::new(Algorithm::Mru, 2, Duration::from_secs(60)).unwrap();
        cache.add("a", 1, true);
        cache.add("b", 2, true);
        cache.get(&"b");
        cache.add("c", 3, true);

        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[test]
    fn add_without_replace_keeps_existing_value() {
        let mut cache: Cache<&str, i32> = Cache::new(Algorithm::Lru, 4, Duration::from_secs(60)).unwrap();
        cache.add("a", 1, true);
        let inserted = cache.add("a", 2, false);
        assert!(!inserted);
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[test]
    fn expired_entries_are_evicted_before_any_mutation_takes_effect() {
        let mut cache: Cache<&str, i32> = Cache::new(Algorithm::Lru, 4, Duration::from_millis(1)).unwrap();
        cache.add("a", 1, true);
        std::thread::sleep(Duration::from_millis(5));
        cache.add("b", 2, true);
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result: Result<Cache<&str, i32>, _> = Cache::new(Algorithm::Lru, 0, Duration::from_secs(1));
        assert!(matches!(result, Err(CacheError::ZeroCapacity)));
    }

    #[test]
    fn pop_removes_and_returns_value() {
        let mut cache: Cache<&str, i32> = Cache::new(Algorithm::Lru, 4, Duration::from_secs(60)).unwrap();
        cache.add("a", 1, true);
        assert_eq!(cache.pop(&"a"), Some(1));
        assert_eq!(cache.size(), 0);
    }
}
