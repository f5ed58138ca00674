//! Configuration for blobkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{BlobError, Result};

/// Main configuration for blob storage and the iterators reading from it
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding blob files
    /// Internal structure:
    ///   {blob_dir}/
    ///     ├── 000001.blob
    ///     └── 000002.blob
    pub blob_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the shared blob value cache (in bytes, 0 disables it)
    pub blob_cache_capacity: usize,

    // -------------------------------------------------------------------------
    // Iterator Configuration
    // -------------------------------------------------------------------------
    /// Budget for indirections pending in one unordered-iterator batch (in bytes)
    pub max_unordered_iter_memory: u64,

    // -------------------------------------------------------------------------
    // Prefetch Configuration
    // -------------------------------------------------------------------------
    /// Readahead window used after a random access (in bytes)
    pub min_readahead_size: usize,

    /// Upper bound the readahead window grows to on sequential access (in bytes)
    pub max_readahead_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blob_dir: PathBuf::from("./blobkv_data"),
            blob_cache_capacity: 64 * 1024 * 1024,      // 64 MB
            max_unordered_iter_memory: 512 * 1024 * 1024, // 512 MB
            min_readahead_size: 8 * 1024,                // 8 KB
            max_readahead_size: 256 * 1024,              // 256 KB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the configuration for values the storage layer cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_unordered_iter_memory == 0 {
            return Err(BlobError::Config(
                "max_unordered_iter_memory must be greater than zero".to_string(),
            ));
        }
        if self.min_readahead_size > self.max_readahead_size {
            return Err(BlobError::Config(format!(
                "min_readahead_size ({}) exceeds max_readahead_size ({})",
                self.min_readahead_size, self.max_readahead_size
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the blob file directory
    pub fn blob_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.blob_dir = path.into();
        self
    }

    /// Set the blob cache capacity (in bytes, 0 disables the cache)
    pub fn blob_cache_capacity(mut self, bytes: usize) -> Self {
        self.config.blob_cache_capacity = bytes;
        self
    }

    /// Set the pending-batch budget of unordered iterators (in bytes)
    pub fn max_unordered_iter_memory(mut self, bytes: u64) -> Self {
        self.config.max_unordered_iter_memory = bytes;
        self
    }

    /// Set the minimum readahead window (in bytes)
    pub fn min_readahead_size(mut self, bytes: usize) -> Self {
        self.config.min_readahead_size = bytes;
        self
    }

    /// Set the maximum readahead window (in bytes)
    pub fn max_readahead_size(mut self, bytes: usize) -> Self {
        self.config.max_readahead_size = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// Read Options
// =============================================================================

/// What an iterator does when a blob cannot be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the error as the iterator status (recoverable)
    #[default]
    Propagate,

    /// Record the error wrapped in `BlobError::Fatal`; the caller escalates
    Fatal,

    /// Log the error and abort the process
    Abort,
}

/// Per-read options
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Insert freshly fetched blobs into the value cache
    pub fill_cache: bool,

    /// Verify blob record checksums on fetch
    pub verify_checksums: bool,

    /// Reaction to blob fetch failures
    pub failure_policy: FailurePolicy,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            fill_cache: true,
            verify_checksums: true,
            failure_policy: FailurePolicy::Propagate,
        }
    }
}
