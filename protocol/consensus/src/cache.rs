//! Bounded per-ancestor snapshot cache.
//!
//! Keys are ancestor block hashes; values are immutable `Arc` snapshots that
//! are never mutated after insertion: a governance change at a new block
//! produces a new hash and a new entry. The fast path is a read-lock lookup
//! with recency tracked through a per-entry atomic, so concurrent readers
//! never serialize; the slow (recompute) path is serialized by callers
//! through [`SnapshotCache::refresh_lock`].

use alloy_primitives::B256;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct Entry<T> {
    value: Arc<T>,
    last_used: AtomicU64,
}

pub struct SnapshotCache<T> {
    entries: RwLock<HashMap<B256, Entry<T>>>,
    clock: AtomicU64,
    capacity: usize,
    refresh: Mutex<()>,
}

impl<T> SnapshotCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            capacity: capacity.max(1),
            refresh: Mutex::new(()),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self, key: &B256) -> Option<Arc<T>> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(Arc::clone(&entry.value))
    }

    pub fn insert(&self, key: B256, value: Arc<T>) {
        let mut entries = self.entries.write();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let evict = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                .map(|(key, _)| *key);
            if let Some(evict) = evict {
                entries.remove(&evict);
            }
        }
        entries.insert(
            key,
            Entry {
                value,
                last_used: AtomicU64::new(self.tick()),
            },
        );
    }

    /// Serializes the expensive recompute path. The double-checked pattern:
    /// miss on `get`, take this lock, `get` again, only then recompute.
    pub fn refresh_lock(&self) -> MutexGuard<'_, ()> {
        self.refresh.lock()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
