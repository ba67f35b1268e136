//! Bounded LRU byte cache, keyed by `(path, line range)`.
//!
//! One mutex guards the whole structure, matching §5's shared-resource policy: LRU reordering
//! and size accounting are cheap enough that holding the lock across them is fine, and
//! path-prefix invalidation (triggered by a write) iterates the map while still holding it.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Whole(String),
    Range(String, usize, usize),
}

impl CacheKey {
    fn path(&self) -> &str {
        match self {
            CacheKey::Whole(p) => p,
            CacheKey::Range(p, _, _) => p,
        }
    }
}

struct Entry {
    bytes: Vec<u8>,
    /// Monotonically increasing "clock" value; higher means more recently used.
    last_used: u64,
}

struct Inner {
    entries: HashMap<CacheKey, Entry>,
    total_bytes: usize,
    ceiling_bytes: usize,
    clock: u64,
}

pub struct ByteCache {
    inner: Mutex<Inner>,
}

impl ByteCache {
    pub fn new(ceiling_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                total_bytes: 0,
                ceiling_bytes,
                clock: 0,
            }),
        }
    }

    /// Fetch `key`, marking it most-recently-used on a hit.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;
        let bytes = inner.entries.get_mut(key).map(|entry| {
            entry.last_used = clock;
            entry.bytes.clone()
        });
        bytes
    }

    /// Insert `bytes` under `key`, evicting least-recently-used entries until the cache fits.
    pub fn put(&self, key: CacheKey, bytes: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        let incoming_len = bytes.len();

        if let Some(old) = inner.entries.remove(&key) {
            inner.total_bytes -= old.bytes.len();
        }

        while inner.total_bytes + incoming_len > inner.ceiling_bytes && !inner.entries.is_empty() {
            let lru_key = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone());
            if let Some(lru_key) = lru_key {
                if let Some(evicted) = inner.entries.remove(&lru_key) {
                    inner.total_bytes -= evicted.bytes.len();
                }
            } else {
                break;
            }
        }

        // A single entry larger than the ceiling is still cached (the ceiling bounds steady
        // state, not a hard per-entry cap) — otherwise a large whole-file read could never be
        // cached at all.
        inner.clock += 1;
        let clock = inner.clock;
        inner.total_bytes += incoming_len;
        inner.entries.insert(
            key,
            Entry {
                bytes,
                last_used: clock,
            },
        );
    }

    /// Drop every entry whose key belongs to `path`. Called after any write to `path`.
    pub fn invalidate_path(&self, path: &str) {
        let mut inner = self.inner.lock().unwrap();
        let stale: Vec<CacheKey> = inner
            .entries
            .keys()
            .filter(|k| k.path() == path)
            .cloned()
            .collect();
        for key in stale {
            if let Some(entry) = inner.entries.remove(&key) {
                inner.total_bytes -= entry.bytes.len();
            }
        }
    }

    #[cfg(test)]
    fn total_bytes(&self) -> usize {
        self.inner.lock().unwrap().total_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let cache = ByteCache::new(10);
        cache.put(CacheKey::Whole("a".into()), vec![0u8; 6]);
        cache.put(CacheKey::Whole("b".into()), vec![0u8; 6]);
        // Inserting b should have evicted a to stay within the ceiling.
        assert!(cache.get(&CacheKey::Whole("a".into())).is_none());
        assert!(cache.get(&CacheKey::Whole("b".into())).is_some());
        assert!(cache.total_bytes() <= 10);
    }

    #[test]
    fn get_refreshes_recency() {
        let cache = ByteCache::new(10);
        cache.put(CacheKey::Whole("a".into()), vec![0u8; 5]);
        cache.put(CacheKey::Whole("b".into()), vec![0u8; 4]);
        // Touch a so it becomes more recent than b.
        assert!(cache.get(&CacheKey::Whole("a".into())).is_some());
        cache.put(CacheKey::Whole("c".into()), vec![0u8; 4]);
        // b should be evicted, not a.
        assert!(cache.get(&CacheKey::Whole("a".into())).is_some());
        assert!(cache.get(&CacheKey::Whole("b".into())).is_none());
    }

    #[test]
    fn write_invalidates_all_ranges_for_path() {
        let cache = ByteCache::new(100);
        cache.put(CacheKey::Whole("p".into()), vec![1]);
        cache.put(CacheKey::Range("p".into(), 0, 5), vec![2]);
        cache.put(CacheKey::Whole("q".into()), vec![3]);
        cache.invalidate_path("p");
        assert!(cache.get(&CacheKey::Whole("p".into())).is_none());
        assert!(cache.get(&CacheKey::Range("p".into(), 0, 5)).is_none());
        assert!(cache.get(&CacheKey::Whole("q".into())).is_some());
    }

    #[test]
    fn cache_coherence_after_write() {
        // Testable property #4: write(p, A); read(p) -> X must equal A regardless of prior cache.
        let cache = ByteCache::new(100);
        cache.put(CacheKey::Whole("p".into()), b"stale".to_vec());
        cache.invalidate_path("p");
        cache.put(CacheKey::Whole("p".into()), b"fresh".to_vec());
        assert_eq!(cache.get(&CacheKey::Whole("p".into())).unwrap(), b"fresh");
    }
}
