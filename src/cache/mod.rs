use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory key/value store with per-entry TTL. Expiry is lazy: an entry
/// past its deadline is evicted on the read that discovers it, there is no
/// background sweep. Absence is a normal result, never an error.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        TtlCache {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if Instant::now() >= entry.expires_at => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    pub fn set(&self, key: &str, value: V, ttl_seconds: u64) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
        };
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key.to_string(), entry);
    }

    pub fn delete(&self, key: &str) {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        TtlCache::new()
    }
}
