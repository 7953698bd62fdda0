//! Bounded-TTL, invalidate-on-write cache.
//!
//! Used for read-through balance lookups and queue aggregates. Entries
//! expire after a fixed TTL and every writer invalidates the key it touched,
//! so a cached value is never older than the TTL and never survives a
//! mutation it should reflect.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// An in-process cache with per-entry expiry and a hard capacity bound.
///
/// Interior mutability keeps the API `&self` so the cache can sit behind an
/// `Arc` inside otherwise-immutable services.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    generation: AtomicU64,
    ttl: Duration,
    max_entries: usize,
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache whose entries expire after `ttl`, holding at most
    /// `max_entries` live entries.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            ttl,
            max_entries,
        }
    }

    /// The current invalidation generation. Snapshot it before a backing
    /// read and pass it to [`TtlCache::insert_if_fresh`] to keep a value
    /// that raced with an invalidation out of the cache.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Inserts `value` only if no invalidation happened since `observed`
    /// was taken with [`TtlCache::generation`]. The check and the insert
    /// share the entry lock with [`TtlCache::invalidate`], so an
    /// invalidation can never slip between them.
    pub fn insert_if_fresh(&self, key: K, value: V, observed: u64) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if self.generation.load(Ordering::Acquire) == observed {
            self.insert_locked(&mut entries, key, value);
        }
    }

    /// Returns the cached value for `key` if present and not expired.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        let Ok(mut entries) = self.entries.lock() else {
            return None;
        };
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Inserts or refreshes a value.
    ///
    /// Expired entries are purged first; if the cache is still full, the
    /// oldest entry is evicted to respect the capacity bound.
    pub fn insert(&self, key: K, value: V) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        self.insert_locked(&mut entries, key, value);
    }

    fn insert_locked(&self, entries: &mut HashMap<K, Entry<V>>, key: K, value: V) {
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drops the entry for `key`, if any, and bumps the generation. Writers
    /// call this after every mutation of the underlying record.
    pub fn invalidate(&self, key: &K) {
        if let Ok(mut entries) = self.entries.lock() {
            self.generation.fetch_add(1, Ordering::AcqRel);
            entries.remove(key);
        }
    }

    /// Number of entries currently held, including any not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
