//! Blob Value Cache
//!
//! Process-wide cache of resolved blob records, keyed by `BlobCacheKey`.
//!
//! ## Sharing Model
//! Values are handed out as `Arc<BlobRecord>`. Eviction only drops the
//! cache's own reference, so a record an iterator is still exposing stays
//! alive until that iterator moves on.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::blob::{BlobCacheKey, BlobRecord};

/// Eviction priority; lower priorities are evicted first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CachePriority {
    Bottom,
    Low,
    High,
}

/// Shared cache of resolved blob records
pub trait ValueCache: Send + Sync {
    /// Look up a record, taking a reference to it on hit
    fn lookup(&self, key: &BlobCacheKey) -> Option<Arc<BlobRecord>>;

    /// Insert a record charged at `charge` bytes and return a reference to it
    fn insert(
        &self,
        key: BlobCacheKey,
        record: BlobRecord,
        charge: usize,
        priority: CachePriority,
    ) -> Arc<BlobRecord>;
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

struct Slot {
    record: Arc<BlobRecord>,
    charge: usize,
    priority: CachePriority,
    /// Position in the eviction order
    tick: u64,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<BlobCacheKey, Slot>,
    /// (priority, tick) → key; first entry is the next victim
    order: BTreeMap<(CachePriority, u64), BlobCacheKey>,
    usage: usize,
    next_tick: u64,
}

impl Inner {
    fn touch(&mut self, key: &BlobCacheKey) -> Option<Arc<BlobRecord>> {
        let tick = self.next_tick;
        let slot = self.slots.get_mut(key)?;
        self.order.remove(&(slot.priority, slot.tick));
        slot.tick = tick;
        self.order.insert((slot.priority, tick), *key);
        self.next_tick += 1;
        Some(Arc::clone(&slot.record))
    }

    fn remove(&mut self, key: &BlobCacheKey) {
        if let Some(slot) = self.slots.remove(key) {
            self.order.remove(&(slot.priority, slot.tick));
            self.usage -= slot.charge;
        }
    }

    fn evict_to(&mut self, capacity: usize) {
        while self.usage > capacity {
            let victim = match self.order.iter().next() {
                Some((_, key)) => *key,
                None => break,
            };
            self.remove(&victim);
            tracing::trace!(usage = self.usage, "Evicted blob cache entry");
        }
    }
}

/// Byte-bounded LRU cache with eviction priorities
///
/// ## Concurrency:
/// - All state behind one `parking_lot::Mutex`
/// - Counters are atomics, readable without the lock
pub struct LruBlobCache {
    capacity: usize,
    inner: Mutex<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LruBlobCache {
    /// Create a cache holding at most `capacity` bytes of charge
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total charge of the entries currently held
    pub fn usage(&self) -> usize {
        self.inner.lock().usage
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &BlobCacheKey) -> bool {
        self.inner.lock().slots.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl ValueCache for LruBlobCache {
    fn lookup(&self, key: &BlobCacheKey) -> Option<Arc<BlobRecord>> {
        let found = self.inner.lock().touch(key);
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    fn insert(
        &self,
        key: BlobCacheKey,
        record: BlobRecord,
        charge: usize,
        priority: CachePriority,
    ) -> Arc<BlobRecord> {
        let record = Arc::new(record);

        // Too large to ever fit: hand it back without retaining it
        if charge > self.capacity {
            return record;
        }

        let mut inner = self.inner.lock();
        inner.remove(&key);

        let tick = inner.next_tick;
        inner.next_tick += 1;
        inner.order.insert((priority, tick), key);
        inner.slots.insert(
            key,
            Slot {
                record: Arc::clone(&record),
                charge,
                priority,
                tick,
            },
        );
        inner.usage += charge;
        inner.evict_to(self.capacity);

        record
    }
}
