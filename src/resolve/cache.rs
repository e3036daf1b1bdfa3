use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

/// `(scope, category, normalized input)`.
type CacheKey = (String, String, String);

/// Bounded memo of resolved values keyed by scope, category and normalized
/// input.
///
/// A scope names the mapping store whose answers an entry holds, so one
/// cache can serve several stores without one store's mappings answering
/// lookups meant for another. Concurrent writers racing on one key always
/// store the same value; last write wins.
pub struct ResolverCache {
    shards: Vec<Mutex<LruCache<CacheKey, String>>>,
}

impl ResolverCache {
    pub fn new(shards: usize, capacity: usize) -> Self {
        let shard_count = shards.max(1);
        let per_shard_cap = NonZeroUsize::new((capacity / shard_count).max(1))
            .unwrap_or(NonZeroUsize::MIN);
        let shards = (0..shard_count)
            .map(|_| Mutex::new(LruCache::new(per_shard_cap)))
            .collect();
        Self { shards }
    }

    pub fn get(&self, scope: &str, category: &str, normalized: &str) -> Option<String> {
        let key = Self::key(scope, category, normalized);
        let mut guard = self.shard_for(&key).lock();
        guard.get(&key).cloned()
    }

    pub fn insert(&self, scope: &str, category: &str, normalized: &str, value: String) {
        let key = Self::key(scope, category, normalized);
        let mut guard = self.shard_for(&key).lock();
        guard.put(key, value);
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
    }

    fn key(scope: &str, category: &str, normalized: &str) -> CacheKey {
        (scope.to_string(), category.to_string(), normalized.to_string())
    }

    fn shard_for(&self, key: &CacheKey) -> &Mutex<LruCache<CacheKey, String>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }
}

impl Default for ResolverCache {
    fn default() -> Self {
        Self::new(8, 4096)
    }
}
