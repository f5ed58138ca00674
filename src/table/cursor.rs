//! Table Cursor
//!
//! `IndexIterator` over the entries of a table, in sorted key order.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;

use crate::blob::ValueKind;
use crate::error::{BlobError, Result};
use crate::iterator::IndexIterator;

use super::{kind_from_byte, ENTRY_HEADER_SIZE, HEADER_SIZE};

/// Read one data-block entry at the reader's position
pub(super) fn read_entry<R: Read>(reader: &mut R) -> Result<(Vec<u8>, Vec<u8>, ValueKind)> {
    let mut header = [0u8; ENTRY_HEADER_SIZE as usize];
    reader.read_exact(&mut header)?;

    let key_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let val_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let kind = kind_from_byte(header[8])?;

    let mut key = vec![0u8; key_len];
    reader.read_exact(&mut key)?;

    let mut value = vec![0u8; val_len];
    reader.read_exact(&mut value)?;

    Ok((key, value, kind))
}

struct Entry {
    key: Vec<u8>,
    value: Vec<u8>,
    kind: ValueKind,
}

/// Cursor over table entries
///
/// Seeks go through the reader's in-memory index; `next()` reads the
/// following entry sequentially. A read failure invalidates the cursor and
/// is reported by `status()`.
pub struct SSTableCursor<'a> {
    file: &'a mut BufReader<File>,
    index: &'a BTreeMap<Vec<u8>, u64>,
    /// Stop reading when we reach this offset (start of index block)
    end_offset: u64,
    /// Offset of the entry after the current one
    next_offset: u64,
    current: Option<Entry>,
    status: Option<BlobError>,
}

impl<'a> SSTableCursor<'a> {
    /// Create an unpositioned cursor; call `seek_to_first()` or `seek()`
    pub(super) fn new(
        file: &'a mut BufReader<File>,
        index: &'a BTreeMap<Vec<u8>, u64>,
        end_offset: u64,
    ) -> Self {
        Self {
            file,
            index,
            end_offset,
            next_offset: end_offset,
            current: None,
            status: None,
        }
    }

    /// Load the entry starting at `offset`, or become invalid past the data block
    ///
    /// With `reposition` unset the file must already sit at `offset`.
    fn load(&mut self, offset: u64, reposition: bool) {
        self.current = None;
        if offset >= self.end_offset {
            self.next_offset = self.end_offset;
            return;
        }

        let loaded = if reposition {
            self.file
                .seek(SeekFrom::Start(offset))
                .map_err(BlobError::from)
                .and_then(|_| read_entry(&mut self.file))
        } else {
            read_entry(&mut self.file)
        };

        match loaded {
            Ok((key, value, kind)) => {
                self.next_offset =
                    offset + ENTRY_HEADER_SIZE + key.len() as u64 + value.len() as u64;
                self.current = Some(Entry { key, value, kind });
            }
            Err(err) => {
                tracing::warn!(offset, error = %err, "Failed to read table entry");
                self.next_offset = self.end_offset;
                self.status = Some(err);
            }
        }
    }
}

impl IndexIterator for SSTableCursor<'_> {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn seek_to_first(&mut self) {
        self.status = None;
        self.load(HEADER_SIZE, true);
    }

    fn seek(&mut self, target: &[u8]) {
        self.status = None;
        let offset = self
            .index
            .range::<[u8], _>((Bound::Included(target), Bound::Unbounded))
            .next()
            .map(|(_, &offset)| offset)
            .unwrap_or(self.end_offset);
        self.load(offset, true);
    }

    fn next(&mut self) {
        debug_assert!(self.valid());
        // The previous load left the file right after the current entry
        let offset = self.next_offset;
        self.load(offset, false);
    }

    fn key(&self) -> &[u8] {
        debug_assert!(self.valid());
        match &self.current {
            Some(entry) => &entry.key,
            None => &[],
        }
    }

    fn value(&self) -> &[u8] {
        debug_assert!(self.valid());
        match &self.current {
            Some(entry) => &entry.value,
            None => &[],
        }
    }

    fn is_blob(&self) -> bool {
        matches!(&self.current, Some(entry) if entry.kind == ValueKind::BlobIndex)
    }

    fn status(&self) -> Result<()> {
        match &self.status {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
