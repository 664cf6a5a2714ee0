//! Sharded concurrent registry for per-identity engine state: a
//! machine-wide "no update" suppression flag, a loader completion
//! table, or anything else keyed by soundcard/loader identity that used
//! to live behind a single process-wide lock.
//!
//! Keyed by anything hashable (typically a [`crate::format::DeviceId`] or
//! a loader name); sharded so unrelated keys don't contend on the same
//! lock. Created on first use, drained at engine shutdown via [`Registry::clear`].

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;

const SHARD_COUNT: usize = 16;

pub struct Registry<K, V> {
    shards: Vec<Mutex<HashMap<K, V>>>,
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self { shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect() }
    }

    fn shard_index(key: &K) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % SHARD_COUNT
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let idx = Self::shard_index(&key);
        self.shards[idx].lock().insert(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let idx = Self::shard_index(key);
        self.shards[idx].lock().remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        let idx = Self::shard_index(key);
        self.shards[idx].lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry across every shard. Call at engine shutdown.
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
    }
}

impl<K, V> Default for Registry<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Registry<K, bool>
where
    K: Eq + Hash + Clone,
{
    /// Replaces the `AGS_MACHINE_NO_UPDATE`-style suppression flag: `true`
    /// means updates for `key` are suppressed.
    pub fn is_suppressed(&self, key: &K) -> bool {
        let idx = Self::shard_index(key);
        *self.shards[idx].lock().get(key).unwrap_or(&false)
    }

    pub fn set_suppressed(&self, key: K, suppressed: bool) {
        if suppressed {
            self.insert(key, true);
        } else {
            self.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DeviceId;

    #[test]
    fn insert_and_remove_round_trip() {
        let registry: Registry<DeviceId, u32> = Registry::new();
        let id = DeviceId::new("jack", 0);
        assert_eq!(registry.insert(id.clone(), 7), None);
        assert!(registry.contains(&id));
        assert_eq!(registry.remove(&id), Some(7));
        assert!(!registry.contains(&id));
    }

    #[test]
    fn suppression_flag_defaults_to_false() {
        let registry: Registry<String, bool> = Registry::new();
        assert!(!registry.is_suppressed(&"loader-a".to_string()));
        registry.set_suppressed("loader-a".to_string(), true);
        assert!(registry.is_suppressed(&"loader-a".to_string()));
        registry.set_suppressed("loader-a".to_string(), false);
        assert!(!registry.is_suppressed(&"loader-a".to_string()));
    }

    #[test]
    fn clear_drops_every_shard() {
        let registry: Registry<u32, u32> = Registry::new();
        for i in 0..64 {
            registry.insert(i, i * 2);
        }
        assert_eq!(registry.len(), 64);
        registry.clear();
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn concurrent_inserts_from_multiple_threads_all_land() {
        let registry: Registry<u32, u32> = Registry::new();
        std::thread::scope(|scope| {
            for t in 0..8u32 {
                let registry = &registry;
                scope.spawn(move || {
                    for i in 0..32u32 {
                        registry.insert(t * 32 + i, i);
                    }
                });
            }
        });
        assert_eq!(registry.len(), 256);
    }
}
