//! # blobkv
//!
//! Key-value separation for LSM storage:
//! - Large values stored out-of-line in append-only blob files
//! - Primary index entries hold a small `BlobIndex` (file, offset, size)
//! - Batched, file-grouped blob resolution for full scans
//! - Per-blob-file live size tracking for garbage collection
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Primary Index (SSTable)                    │
//! │        key → inline value  |  key → BlobIndex                │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │ build                         │ scan
//!                ▼                               ▼
//!   ┌──────────────────────┐        ┌──────────────────────────┐
//!   │ BlobFileSizeCollector│        │    UnorderedIterator     │
//!   │ (sizes per blob file)│        │ Scanning ⇄ Draining      │
//!   └──────────────────────┘        └─────┬──────────────┬─────┘
//!                                         │              │
//!                                         ▼              ▼
//!                               ┌──────────────┐  ┌─────────────┐
//!                               │  Blob Cache  │  │ Prefetcher  │
//!                               │  (shared)    │  │ (per file)  │
//!                               └──────────────┘  └──────┬──────┘
//!                                                        ▼
//!                                                 ┌─────────────┐
//!                                                 │ Blob Files  │
//!                                                 └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod varint;

pub mod blob;
pub mod cache;
pub mod collector;
pub mod iterator;
pub mod metrics;
pub mod table;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BlobError, Result};
pub use config::{Config, FailurePolicy, ReadOptions};
pub use blob::{BlobHandle, BlobIndex, BlobRecord, BlobStorage, ValueKind};
pub use collector::{BlobFileSizeCollector, FileSizeMap};
pub use iterator::{IndexIterator, UnorderedIterator};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of blobkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
