//! Table Module
//!
//! Primary index segments: immutable sorted files mapping keys to either
//! inline values or blob indexes, with named properties from collectors.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "BKVT" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [KeyLen: u32][ValLen: u32][Kind: u8][Key][Value]      │
//! │   ... repeated for each entry ...                       │
//! │   (Kind 0 = inline value, 1 = encoded BlobIndex)        │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                  │
//! │   [KeyLen: u32][Offset: u64][Key]                       │
//! │   ... repeated for each entry ...                       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Properties Block (variable)                             │
//! │   [Count: u32]                                          │
//! │   [NameLen: u32][ValLen: u32][Name][Value]              │
//! │   ... repeated Count times ...                          │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (24 bytes)                                       │
//! │   IndexOffset: u64 | PropsOffset: u64 | DataCRC: u32    │
//! │   Padding (4)                                           │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod cursor;
mod reader;

use std::path::PathBuf;

use crate::blob::ValueKind;
use crate::error::{BlobError, Result};

pub use builder::SSTableBuilder;
pub use cursor::SSTableCursor;
pub use reader::SSTableReader;

// =============================================================================
// Shared Constants (used by builder, reader, cursor)
// =============================================================================

/// Magic bytes identifying a blobkv index table
pub(crate) const MAGIC: &[u8; 4] = b"BKVT";

/// Current table format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: IndexOffset (8) + PropsOffset (8) + DataCRC (4) + Padding (4) = 24 bytes
pub(crate) const FOOTER_SIZE: u64 = 24;

/// Entry header size: KeyLen (4) + ValLen (4) + Kind (1) = 9 bytes
pub(crate) const ENTRY_HEADER_SIZE: u64 = 9;

pub(crate) fn kind_to_byte(kind: ValueKind) -> u8 {
    match kind {
        ValueKind::Inline => 0,
        ValueKind::BlobIndex => 1,
    }
}

pub(crate) fn kind_from_byte(byte: u8) -> Result<ValueKind> {
    match byte {
        0 => Ok(ValueKind::Inline),
        1 => Ok(ValueKind::BlobIndex),
        other => Err(BlobError::Storage(format!(
            "Unknown table entry kind: {}",
            other
        ))),
    }
}

// =============================================================================
// Table Metadata
// =============================================================================

/// Metadata of a finished table, returned by `SSTableBuilder::finish`
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Path to the table file
    pub path: PathBuf,
    /// Number of entries in this table
    pub entry_count: u64,
    /// Entries whose value lives in a blob file
    pub blob_entry_count: u64,
    /// Smallest key (for range filtering)
    pub min_key: Vec<u8>,
    /// Largest key (for range filtering)
    pub max_key: Vec<u8>,
    /// File size in bytes
    pub file_size: u64,
}

impl SSTable {
    /// Get the number of entries
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Quick check if a key might be in this table (range check)
    /// Returns false if key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        self.entry_count > 0 && key >= self.min_key.as_slice() && key <= self.max_key.as_slice()
    }
}
