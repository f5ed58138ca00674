//! Blob Storage
//!
//! Owns the blob directory and the shared value cache.
//!
//! ## Responsibilities
//! - Discover existing blob files on startup
//! - Hand out per-file prefetchers to iterators
//! - Provide the process-wide blob value cache

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{LruBlobCache, ValueCache};
use crate::config::{Config, ReadOptions};
use crate::error::{BlobError, Result};
use crate::iterator::{IndexIterator, UnorderedIterBuilder};

use super::{BlobFilePrefetcher, BlobPrefetcher, PrefetcherFactory, BLOB_FILE_EXTENSION};

/// Blob files of one column of data, plus the cache in front of them
///
/// ## Concurrency:
/// - Immutable after `open`; every method takes `&self`
/// - Each prefetcher opens its own file handle, so iterators never share one
/// - The cache synchronizes internally
pub struct BlobStorage {
    config: Config,

    /// Shared value cache (None when capacity is 0)
    cache: Option<Arc<dyn ValueCache>>,
}

impl BlobStorage {
    /// Open blob storage rooted at `config.blob_dir`
    ///
    /// On startup:
    /// 1. Validate the configuration
    /// 2. Create the directory if it doesn't exist
    /// 3. Build the shared cache if enabled
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.blob_dir)?;

        let cache: Option<Arc<dyn ValueCache>> = if config.blob_cache_capacity > 0 {
            Some(Arc::new(LruBlobCache::new(config.blob_cache_capacity)))
        } else {
            None
        };

        let storage = Self {
            config: config.clone(),
            cache,
        };

        tracing::info!(
            blob_dir = %config.blob_dir.display(),
            blob_files = storage.file_numbers()?.len(),
            cache_capacity = config.blob_cache_capacity,
            "Opened blob storage"
        );

        Ok(storage)
    }

    /// List blob file numbers present in the directory, ascending
    pub fn file_numbers(&self) -> Result<Vec<u64>> {
        let mut numbers = Vec::new();

        for entry in fs::read_dir(&self.config.blob_dir)? {
            let entry = entry?;
            let file_path = entry.path();

            if file_path.is_file() {
                if let Some(number) = Self::parse_file_number(&file_path) {
                    numbers.push(number);
                }
            }
        }

        numbers.sort_unstable();
        Ok(numbers)
    }

    /// Path of the blob file with the given number
    pub fn blob_file_path(&self, file_number: u64) -> PathBuf {
        Self::blob_file_path_with_dir(&self.config.blob_dir, file_number)
    }

    /// Path of a blob file inside `dir` (format: 000042.blob)
    pub fn blob_file_path_with_dir(dir: &Path, file_number: u64) -> PathBuf {
        dir.join(format!("{:06}.{}", file_number, BLOB_FILE_EXTENSION))
    }

    /// The shared value cache, if enabled
    pub fn blob_cache(&self) -> Option<Arc<dyn ValueCache>> {
        self.cache.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start building an unordered iterator over `inner` that resolves blobs
    /// from this storage, using its cache and pending-memory budget
    pub fn unordered_iter<I: IndexIterator>(
        self: &Arc<Self>,
        inner: I,
        read_options: ReadOptions,
    ) -> UnorderedIterBuilder<I> {
        let factory: Arc<dyn PrefetcherFactory> = self.clone();
        let builder = UnorderedIterBuilder::new(inner, factory)
            .read_options(read_options)
            .max_pending_memory(self.config.max_unordered_iter_memory);

        match self.blob_cache() {
            Some(cache) => builder.cache(cache),
            None => builder,
        }
    }

    /// Parse the file number from a blob file name (e.g., "000042.blob" → 42)
    fn parse_file_number(path: &Path) -> Option<u64> {
        if path.extension()? != BLOB_FILE_EXTENSION {
            return None;
        }
        path.file_stem()?.to_str()?.parse().ok()
    }
}

impl PrefetcherFactory for BlobStorage {
    fn new_prefetcher(&self, file_number: u64) -> Result<Box<dyn BlobPrefetcher>> {
        let path = self.blob_file_path(file_number);
        if !path.exists() {
            return Err(BlobError::BlobFileNotFound(file_number));
        }

        let prefetcher = BlobFilePrefetcher::open(
            &path,
            file_number,
            self.config.min_readahead_size,
            self.config.max_readahead_size,
        )?;

        Ok(Box::new(prefetcher))
    }
}
