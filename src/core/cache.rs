use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// In-memory key/value cache with per-entry expiry.
///
/// Constructed once per process and passed to whoever needs it; there is
/// no global instance. Expired entries are evicted lazily on read, or
/// all at once by [`TtlCache::sweep`].
pub struct TtlCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        TtlCache {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn put(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Returns the cached value if present and not expired. An expired
    /// entry is removed on the spot.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Removes every expired entry.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.retain(|_, entry| now < entry.expires_at);
    }

    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        TtlCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_then_get_round_trips() {
        let cache = TtlCache::new();
        cache.put("quote:BTCUSDT", json!({"price": 42000}), Duration::from_secs(60));
        assert_eq!(cache.get("quote:BTCUSDT"), Some(json!({"price": 42000})));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn expired_entries_are_evicted_on_read() {
        let cache = TtlCache::new();
        cache.put("k", json!(1), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty(), "read should have evicted the entry");
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let cache = TtlCache::new();
        cache.put("stale", json!(1), Duration::from_millis(0));
        cache.put("fresh", json!(2), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(5));

        cache.sweep();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(json!(2)));
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = TtlCache::new();
        cache.put("k", json!(1), Duration::from_secs(60));
        cache.clear();
        assert!(cache.is_empty());
    }
}
