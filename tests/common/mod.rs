//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use blobkv::blob::{
    encode_file_header, BlobHandle, BlobIndex, BlobPrefetcher, BlobRecord, BlobStorage,
    PrefetcherFactory, ValueKind,
};
use blobkv::iterator::{IndexIterator, MemIterator, UnorderedIterator};
use blobkv::{BlobError, Config, ReadOptions, Result};
use parking_lot::Mutex;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

// =============================================================================
// Setup
// =============================================================================

/// Route tracing output through the test harness (RUST_LOG to enable)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Blob storage in a fresh temp directory
pub fn setup_storage(cache_capacity: usize) -> (TempDir, Arc<BlobStorage>) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .blob_dir(temp_dir.path().join("blobs"))
        .blob_cache_capacity(cache_capacity)
        .min_readahead_size(64)
        .max_readahead_size(1024)
        .build();
    let storage = BlobStorage::open(&config).unwrap();
    (temp_dir, Arc::new(storage))
}

/// Write a blob file holding `records` in the given order
///
/// Returns the index of each record, in the same order.
pub fn write_blob_file(
    storage: &BlobStorage,
    file_number: u64,
    records: &[(Vec<u8>, Vec<u8>)],
) -> Vec<BlobIndex> {
    let mut buf = Vec::new();
    encode_file_header(&mut buf);

    let mut indexes = Vec::with_capacity(records.len());
    for (key, value) in records {
        let offset = buf.len() as u64;
        BlobRecord::new(key.clone(), value.clone()).encode_to(&mut buf);
        indexes.push(BlobIndex::new(file_number, offset, buf.len() as u64 - offset));
    }

    std::fs::write(storage.blob_file_path(file_number), &buf).unwrap();
    indexes
}

// =============================================================================
// Datasets
// =============================================================================

pub type IndexEntry = (Vec<u8>, ValueKind, Vec<u8>);

/// Index entries plus the (key, value) pairs they resolve to
pub struct Dataset {
    pub entries: Vec<IndexEntry>,
    pub expected: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Dataset {
    pub fn iter(&self) -> MemIterator {
        MemIterator::new(self.entries.clone())
    }

    pub fn blob_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, kind, _)| *kind == ValueKind::BlobIndex)
            .count()
    }
}

pub fn key(i: usize) -> Vec<u8> {
    format!("key{:05}", i).into_bytes()
}

pub fn blob_value(i: usize) -> Vec<u8> {
    format!("blob-value-{:05}|", i).repeat(4).into_bytes()
}

/// `count` keys: every third inline, the rest spread over `files` blob files
///
/// Records are written to each blob file in descending key order, so
/// physical order within a file is the reverse of key order.
pub fn build_dataset(storage: &BlobStorage, count: usize, files: u64) -> Dataset {
    build(storage, count, files, true)
}

/// Like `build_dataset`, but every key lives in a blob file
pub fn build_blob_dataset(storage: &BlobStorage, count: usize, files: u64) -> Dataset {
    build(storage, count, files, false)
}

fn build(storage: &BlobStorage, count: usize, files: u64, with_inline: bool) -> Dataset {
    let mut entries = Vec::new();
    let mut expected = BTreeMap::new();
    let mut per_file: BTreeMap<u64, Vec<(Vec<u8>, Vec<u8>)>> = BTreeMap::new();
    let mut blobs = 0u64;

    for i in 0..count {
        if with_inline && i % 3 == 0 {
            let value = format!("inline{}", i).into_bytes();
            entries.push(MemIterator::inline(key(i), value.clone()));
            expected.insert(key(i), value);
        } else {
            let file_number = 1 + (blobs % files);
            blobs += 1;
            per_file
                .entry(file_number)
                .or_default()
                .push((key(i), blob_value(i)));
            expected.insert(key(i), blob_value(i));
        }
    }

    for (file_number, mut records) in per_file {
        records.reverse();
        let indexes = write_blob_file(storage, file_number, &records);
        for ((key, _), index) in records.iter().zip(indexes.iter()) {
            entries.push(MemIterator::blob(key.clone(), index));
        }
    }

    Dataset { entries, expected }
}

/// Drain an unordered iterator into (key, value) pairs, in yield order
pub fn collect<I: IndexIterator>(iter: &mut UnorderedIterator<I>) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut pairs = Vec::new();
    while iter.valid() {
        pairs.push((iter.key().to_vec(), iter.value().to_vec()));
        iter.next();
    }
    pairs
}

// =============================================================================
// Fault injection
// =============================================================================

/// Prefetcher factory that logs every read and can fail a chosen one
pub struct RecordingFactory {
    inner: Arc<BlobStorage>,
    /// (file number, handle) of every fetch attempt, in order
    pub reads: Arc<Mutex<Vec<(u64, BlobHandle)>>>,
    /// File numbers prefetchers were opened for, in order
    pub opened: Arc<Mutex<Vec<u64>>>,
    /// (file number, offset) of the fetch to fail
    fail_on: Option<(u64, u64)>,
}

impl RecordingFactory {
    pub fn new(inner: Arc<BlobStorage>) -> Self {
        Self {
            inner,
            reads: Arc::new(Mutex::new(Vec::new())),
            opened: Arc::new(Mutex::new(Vec::new())),
            fail_on: None,
        }
    }

    pub fn failing_on(inner: Arc<BlobStorage>, index: &BlobIndex) -> Self {
        Self {
            fail_on: Some((index.file_number, index.handle.offset)),
            ..Self::new(inner)
        }
    }
}

impl PrefetcherFactory for RecordingFactory {
    fn new_prefetcher(&self, file_number: u64) -> Result<Box<dyn BlobPrefetcher>> {
        let inner = self.inner.new_prefetcher(file_number)?;
        self.opened.lock().push(file_number);
        Ok(Box::new(RecordingPrefetcher {
            file_number,
            inner,
            reads: Arc::clone(&self.reads),
            fail_on: self.fail_on,
        }))
    }
}

struct RecordingPrefetcher {
    file_number: u64,
    inner: Box<dyn BlobPrefetcher>,
    reads: Arc<Mutex<Vec<(u64, BlobHandle)>>>,
    fail_on: Option<(u64, u64)>,
}

impl BlobPrefetcher for RecordingPrefetcher {
    fn get(&mut self, options: &ReadOptions, handle: &BlobHandle) -> Result<BlobRecord> {
        self.reads.lock().push((self.file_number, *handle));
        if self.fail_on == Some((self.file_number, handle.offset)) {
            return Err(BlobError::from(io::Error::new(
                io::ErrorKind::Other,
                "injected read failure",
            )));
        }
        self.inner.get(options, handle)
    }
}

/// Inner iterator that fails after yielding `limit` entries
pub struct FailingInner {
    inner: MemIterator,
    remaining: usize,
    failed: bool,
}

impl FailingInner {
    pub fn new(inner: MemIterator, limit: usize) -> Self {
        Self {
            inner,
            remaining: limit,
            failed: false,
        }
    }
}

impl IndexIterator for FailingInner {
    fn valid(&self) -> bool {
        !self.failed && self.inner.valid()
    }

    fn seek_to_first(&mut self) {
        self.inner.seek_to_first();
    }

    fn seek(&mut self, target: &[u8]) {
        self.inner.seek(target);
    }

    fn next(&mut self) {
        self.inner.next();
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.failed = true;
        }
    }

    fn key(&self) -> &[u8] {
        self.inner.key()
    }

    fn value(&self) -> &[u8] {
        self.inner.value()
    }

    fn is_blob(&self) -> bool {
        self.inner.is_blob()
    }

    fn status(&self) -> Result<()> {
        if self.failed {
            Err(BlobError::Storage("inner iterator failed".to_string()))
        } else {
            self.inner.status()
        }
    }
}
