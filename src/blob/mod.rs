//! Blob Module
//!
//! Out-of-line storage for large values. The primary index keeps a small
//! `BlobIndex` per key; the value itself lives in an append-only blob file.
//!
//! ## Blob File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (8 bytes)                                        │
//! │   Magic: "BKVB" (4) | Version: u32 (4)                  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Record (variable)          <- BlobHandle { offset, size }│
//! │   CRC32 (4) | BodyLen (4) | Compression (1)             │
//! │   [KeyLen: varint][Key][ValueLen: varint][Value]        │
//! │   ... repeated for each record ...                      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The CRC covers the compression byte and the body.

mod index;
mod prefetcher;
mod record;
mod storage;

pub use index::{BlobCacheKey, BlobHandle, BlobIndex, ValueKind, BLOB_INDEX_TAG};
pub use prefetcher::{BlobFilePrefetcher, BlobPrefetcher, PrefetcherFactory};
pub use record::{BlobRecord, CompressionType, PinnedRecord, RECORD_HEADER_SIZE};
pub use storage::BlobStorage;

use crate::error::{BlobError, Result};

// =============================================================================
// Shared Constants (used by record codec, prefetcher, storage)
// =============================================================================

/// Magic bytes identifying a blob file
pub const BLOB_FILE_MAGIC: &[u8; 4] = b"BKVB";

/// Current blob file format version
pub const BLOB_FILE_VERSION: u32 = 1;

/// Header size: Magic (4) + Version (4) = 8 bytes
pub const BLOB_FILE_HEADER_SIZE: u64 = 8;

/// Extension of blob files inside the blob directory
pub(crate) const BLOB_FILE_EXTENSION: &str = "blob";

/// Append a blob file header to `buf`
pub fn encode_file_header(buf: &mut Vec<u8>) {
    buf.extend_from_slice(BLOB_FILE_MAGIC);
    buf.extend_from_slice(&BLOB_FILE_VERSION.to_le_bytes());
}

/// Validate a blob file header
pub fn check_file_header(header: &[u8]) -> Result<()> {
    if header.len() < BLOB_FILE_HEADER_SIZE as usize {
        return Err(BlobError::Corruption(format!(
            "Blob file header too short: {} bytes",
            header.len()
        )));
    }

    if &header[0..4] != BLOB_FILE_MAGIC {
        return Err(BlobError::Corruption(format!(
            "Invalid blob file magic: expected BKVB, got {:?}",
            &header[0..4]
        )));
    }

    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != BLOB_FILE_VERSION {
        return Err(BlobError::Corruption(format!(
            "Unsupported blob file version: {}",
            version
        )));
    }

    Ok(())
}
