//! A small process-wide TTL cache, generic over the cached value, shared
//! by the state-comparison cache here and the entity cache in
//! `meetgraph-resolver`. Reads never block writers for long: the whole
//! cache is behind one mutex, but entries are cheap `Clone`s, so the lock
//! is held only for the lookup/insert itself (spec §5: "process-wide...
//! writes are guarded").

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct TtlCache<V: Clone> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let guard = self.entries.lock().expect("ttl cache mutex poisoned");
        guard.get(key).and_then(|(inserted_at, value)| {
            if inserted_at.elapsed() < self.ttl {
                Some(value.clone())
            } else {
                None
            }
        })
    }

    pub fn insert(&self, key: String, value: V) {
        let mut guard = self.entries.lock().expect("ttl cache mutex poisoned");
        guard.insert(key, (Instant::now(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("ttl cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().expect("ttl cache mutex poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_miss() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_millis(10));
        cache.insert("k".to_string(), 1);
        assert_eq!(cache.get("k"), Some(1));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("k"), None);
    }
}
