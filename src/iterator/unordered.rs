//! Unordered Iterator
//!
//! Resolves blob indexes in batches, grouped by blob file and read in
//! offset order, instead of one random read per key.
//!
//! ## States
//! ```text
//!            inline entry: yield it
//!              ┌──────┐
//!              ▼      │
//!        ┌───────────┐   batch ready   ┌────────────┐
//!  ────► │ Scanning  │ ──────────────► │  Draining  │ ──┐ one record per next()
//!        └───────────┘ ◄────────────── └────────────┘ ◄─┘ file by file
//!              │       batch drained,        │
//!              │       more input            │ batch drained, no more input
//!              │ nothing pending             │ or any error
//!              ▼                             ▼
//!        ┌─────────────────────────────────────────┐
//!        │                Exhausted                │
//!        └─────────────────────────────────────────┘
//! ```
//!
//! Keys yielded while draining are ordered by blob file and position, not by
//! key. Every key in range is yielded exactly once.

use std::collections::{btree_map, BTreeMap, HashSet};
use std::sync::Arc;

use crate::blob::{BlobHandle, BlobIndex, BlobPrefetcher, PinnedRecord, PrefetcherFactory};
use crate::cache::{CachePriority, ValueCache};
use crate::config::{Config, FailurePolicy, ReadOptions};
use crate::error::{BlobError, Result};
use crate::metrics::{Histogram, MetricsSink, NoopMetrics};

use super::{BytewiseComparator, Comparator, IndexIterator};

/// Memory charged per pending blob index (file number + handle bookkeeping)
pub const PENDING_ENTRY_CHARGE: u64 = 2 * std::mem::size_of::<u64>() as u64;

/// Entry currently exposed by the iterator
enum Current {
    /// Served straight from the inner iterator, which stays positioned on it
    Inline,
    Resolved(PinnedRecord),
}

/// The blob file being read while draining
struct ActiveGroup {
    file_number: u64,
    /// Remaining handles, ascending by (offset, size)
    handles: std::vec::IntoIter<BlobHandle>,
    prefetcher: Box<dyn BlobPrefetcher>,
}

struct DrainCursor {
    /// Groups not yet started
    groups: btree_map::IntoIter<u64, Vec<BlobHandle>>,
    active: Option<ActiveGroup>,
}

enum State {
    Scanning,
    Draining(DrainCursor),
    Exhausted,
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for `UnorderedIterator`
pub struct UnorderedIterBuilder<I: IndexIterator> {
    inner: I,
    storage: Arc<dyn PrefetcherFactory>,
    lower_bound: Option<Vec<u8>>,
    upper_bound: Option<Vec<u8>>,
    comparator: Arc<dyn Comparator>,
    read_options: ReadOptions,
    cache: Option<Arc<dyn ValueCache>>,
    metrics: Arc<dyn MetricsSink>,
    max_pending_memory: u64,
}

impl<I: IndexIterator> UnorderedIterBuilder<I> {
    pub fn new(inner: I, storage: Arc<dyn PrefetcherFactory>) -> Self {
        Self {
            inner,
            storage,
            lower_bound: None,
            upper_bound: None,
            comparator: Arc::new(BytewiseComparator),
            read_options: ReadOptions::default(),
            cache: None,
            metrics: Arc::new(NoopMetrics),
            max_pending_memory: Config::default().max_unordered_iter_memory,
        }
    }

    /// Inclusive lower bound; the iterator starts at the first key >= `key`
    pub fn lower_bound(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.lower_bound = Some(key.into());
        self
    }

    /// Exclusive upper bound
    pub fn upper_bound(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.upper_bound = Some(key.into());
        self
    }

    /// Comparator for bound checks (default: bytewise)
    pub fn comparator(mut self, comparator: Arc<dyn Comparator>) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn read_options(mut self, options: ReadOptions) -> Self {
        self.read_options = options;
        self
    }

    /// Shared value cache consulted before every fetch
    pub fn cache(mut self, cache: Arc<dyn ValueCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sink receiving the touched blob file count when the iterator is dropped
    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Budget for pending blob indexes, charged `PENDING_ENTRY_CHARGE` each
    pub fn max_pending_memory(mut self, bytes: u64) -> Self {
        self.max_pending_memory = bytes;
        self
    }

    /// Position the inner iterator and move to the first entry
    pub fn build(self) -> UnorderedIterator<I> {
        let mut iter = UnorderedIterator {
            inner: self.inner,
            storage: self.storage,
            upper_bound: self.upper_bound,
            comparator: self.comparator,
            read_options: self.read_options,
            cache: self.cache,
            metrics: self.metrics,
            max_pending_memory: self.max_pending_memory,
            state: State::Scanning,
            pending: BTreeMap::new(),
            pending_memory: 0,
            current: None,
            inner_consumed: false,
            status: None,
            touched_files: HashSet::new(),
            drained_batches: 0,
        };

        match &self.lower_bound {
            Some(lower) => iter.inner.seek(lower),
            None => iter.inner.seek_to_first(),
        }
        iter.advance();
        iter
    }
}

// =============================================================================
// Iterator
// =============================================================================

/// Forward-only iterator yielding resolved (key, value) pairs in
/// batch order rather than key order
///
/// Not reentrant; use from one thread at a time. Random access is not
/// offered: positioning happens once, in `UnorderedIterBuilder::build`.
pub struct UnorderedIterator<I: IndexIterator> {
    inner: I,
    storage: Arc<dyn PrefetcherFactory>,
    upper_bound: Option<Vec<u8>>,
    comparator: Arc<dyn Comparator>,
    read_options: ReadOptions,
    cache: Option<Arc<dyn ValueCache>>,
    metrics: Arc<dyn MetricsSink>,
    max_pending_memory: u64,

    state: State,
    /// Blob indexes collected while scanning, by blob file
    pending: BTreeMap<u64, Vec<BlobHandle>>,
    pending_memory: u64,
    current: Option<Current>,
    /// The inner iterator sits on an entry that was already yielded
    inner_consumed: bool,
    status: Option<BlobError>,
    touched_files: HashSet<u64>,
    drained_batches: u64,
}

impl<I: IndexIterator> UnorderedIterator<I> {
    pub fn builder(inner: I, storage: Arc<dyn PrefetcherFactory>) -> UnorderedIterBuilder<I> {
        UnorderedIterBuilder::new(inner, storage)
    }

    /// Whether an entry is exposed and no error has occurred
    pub fn valid(&self) -> bool {
        self.status.is_none() && self.current.is_some()
    }

    /// Move to the next entry (requires `valid()`)
    pub fn next(&mut self) {
        debug_assert!(self.valid());
        self.current = None;
        self.advance();
    }

    /// Current key (requires `valid()`)
    pub fn key(&self) -> &[u8] {
        debug_assert!(self.valid());
        match &self.current {
            Some(Current::Inline) => self.inner.key(),
            Some(Current::Resolved(record)) => &record.key,
            None => &[],
        }
    }

    /// Current value (requires `valid()`)
    pub fn value(&self) -> &[u8] {
        debug_assert!(self.valid());
        match &self.current {
            Some(Current::Inline) => self.inner.value(),
            Some(Current::Resolved(record)) => &record.value,
            None => &[],
        }
    }

    /// The recorded error, or else the inner iterator's current status
    pub fn status(&self) -> Result<()> {
        match &self.status {
            Some(err) => Err(err.clone()),
            None => self.inner.status(),
        }
    }

    /// Distinct blob files read from so far
    pub fn touched_file_count(&self) -> usize {
        self.touched_files.len()
    }

    /// Batches handed from scanning to draining so far
    pub fn drained_batches(&self) -> u64 {
        self.drained_batches
    }

    fn advance(&mut self) {
        loop {
            match std::mem::replace(&mut self.state, State::Exhausted) {
                State::Exhausted => return,

                State::Scanning => match self.scan() {
                    Ok(true) => {
                        self.state = State::Scanning;
                        return;
                    }
                    Ok(false) if self.pending.is_empty() => return,
                    Ok(false) => {
                        let batch = std::mem::take(&mut self.pending);
                        tracing::trace!(
                            blob_files = batch.len(),
                            pending_memory = self.pending_memory,
                            "Draining blob batch"
                        );
                        self.pending_memory = 0;
                        self.drained_batches += 1;
                        self.state = State::Draining(DrainCursor {
                            groups: batch.into_iter(),
                            active: None,
                        });
                    }
                    Err(err) => return self.fail(err),
                },

                State::Draining(mut cursor) => {
                    if let Some(group) = cursor.active.as_mut() {
                        if let Some(handle) = group.handles.next() {
                            match self.resolve(group.file_number, handle, &mut *group.prefetcher) {
                                Ok(record) => {
                                    self.current = Some(Current::Resolved(record));
                                    self.state = State::Draining(cursor);
                                    return;
                                }
                                Err(err) => return self.fail(err),
                            }
                        }
                    }

                    // Release the finished file's prefetcher before opening the next
                    cursor.active = None;

                    match cursor.groups.next() {
                        Some((file_number, mut handles)) => {
                            handles.sort_unstable();
                            match self.storage.new_prefetcher(file_number) {
                                Ok(prefetcher) => {
                                    self.touched_files.insert(file_number);
                                    cursor.active = Some(ActiveGroup {
                                        file_number,
                                        handles: handles.into_iter(),
                                        prefetcher,
                                    });
                                    self.state = State::Draining(cursor);
                                }
                                Err(err) => return self.fail(err),
                            }
                        }
                        None => {
                            if self.has_more_input() {
                                self.state = State::Scanning;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Walk the inner iterator, collecting blob indexes
    ///
    /// Returns `Ok(true)` when an inline entry is exposed. Returns `Ok(false)`
    /// when input ran out, the upper bound was reached, the memory budget was
    /// spent, or an inline entry follows pending blob indexes; the entry the
    /// inner iterator rests on is left for the next scan.
    fn scan(&mut self) -> Result<bool> {
        if self.inner_consumed {
            self.inner_consumed = false;
            self.inner.next();
        }

        while self.has_more_input() {
            if !self.inner.is_blob() {
                if !self.pending.is_empty() {
                    break;
                }
                self.current = Some(Current::Inline);
                self.inner_consumed = true;
                return Ok(true);
            }

            let index = BlobIndex::decode(self.inner.value())?;
            self.pending
                .entry(index.file_number)
                .or_default()
                .push(index.handle);
            self.pending_memory += PENDING_ENTRY_CHARGE;
            self.inner.next();

            if self.pending_memory >= self.max_pending_memory {
                break;
            }
        }

        Ok(false)
    }

    fn has_more_input(&self) -> bool {
        if !self.inner.valid() {
            return false;
        }
        match &self.upper_bound {
            Some(upper) => self.comparator.compare(self.inner.key(), upper).is_lt(),
            None => true,
        }
    }

    /// Resolve one handle: cache first, then the file
    fn resolve(
        &self,
        file_number: u64,
        handle: BlobHandle,
        prefetcher: &mut dyn BlobPrefetcher,
    ) -> Result<PinnedRecord> {
        let cache_key = BlobIndex { file_number, handle }.cache_key();

        if let Some(cache) = &self.cache {
            if let Some(record) = cache.lookup(&cache_key) {
                return Ok(PinnedRecord::Cached(record));
            }
        }

        let record = match prefetcher.get(&self.read_options, &handle) {
            Ok(record) => record,
            Err(err) => {
                tracing::error!(
                    file_number,
                    offset = handle.offset,
                    size = handle.size,
                    error = %err,
                    "Failed to read blob value"
                );
                return Err(self.escalate(err));
            }
        };

        match &self.cache {
            Some(cache) if self.read_options.fill_cache => {
                let charge = record.charge();
                let shared = cache.insert(cache_key, record, charge, CachePriority::Bottom);
                Ok(PinnedRecord::Cached(shared))
            }
            _ => Ok(PinnedRecord::Owned(record)),
        }
    }

    fn escalate(&self, err: BlobError) -> BlobError {
        match self.read_options.failure_policy {
            FailurePolicy::Propagate => err,
            FailurePolicy::Fatal => BlobError::Fatal(Box::new(err)),
            FailurePolicy::Abort => {
                tracing::error!(error = %err, "Aborting on blob read failure");
                std::process::abort()
            }
        }
    }

    /// Stop for good, keeping `err` as the status
    fn fail(&mut self, err: BlobError) {
        self.current = None;
        self.pending.clear();
        self.pending_memory = 0;
        self.state = State::Exhausted;
        self.status = Some(err);
    }
}

impl<I: IndexIterator> Drop for UnorderedIterator<I> {
    fn drop(&mut self) {
        let touched = self.touched_files.len() as u64;
        tracing::debug!(
            touched_blob_files = touched,
            drained_batches = self.drained_batches,
            "Unordered iterator finished"
        );
        self.metrics.record(Histogram::IterTouchBlobFileCount, touched);
    }
}
