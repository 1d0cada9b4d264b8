//! Explicitly owned TTL cache.
//!
//! Owned and injected by whichever component needs memoization, never a
//! process-wide singleton. Entries expire after a fixed TTL; when the cache
//! is full the stalest entry is evicted first.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

pub struct TtlCache<K, V> {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

struct Entry<V> {
    stored_at: DateTime<Utc>,
    value: V,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        match entries.get(key) {
            Some(entry) if now - entry.stored_at <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.retain(|_, entry| now - entry.stored_at <= self.ttl);
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            if let Some(stalest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&stalest);
            }
        }
        entries.insert(
            key,
            Entry {
                stored_at: now,
                value,
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.remove(key);
    }
}
