//! In-memory index cursor
//!
//! Sorted snapshot of index entries held in memory.

use std::collections::BTreeMap;

use crate::blob::{BlobIndex, ValueKind};
use crate::error::Result;

use super::IndexIterator;

/// `IndexIterator` over an owned, sorted set of entries
pub struct MemIterator {
    /// (key, kind, value) sorted by key
    entries: Vec<(Vec<u8>, ValueKind, Vec<u8>)>,
    /// Current position; `entries.len()` when invalid
    pos: usize,
}

impl MemIterator {
    /// Build from entries in any order; a later duplicate key replaces an earlier one
    pub fn new(entries: impl IntoIterator<Item = (Vec<u8>, ValueKind, Vec<u8>)>) -> Self {
        let sorted: BTreeMap<Vec<u8>, (ValueKind, Vec<u8>)> = entries
            .into_iter()
            .map(|(key, kind, value)| (key, (kind, value)))
            .collect();

        let entries: Vec<_> = sorted
            .into_iter()
            .map(|(key, (kind, value))| (key, kind, value))
            .collect();
        let pos = entries.len();

        Self { entries, pos }
    }

    /// Convenience constructor for an inline entry
    pub fn inline(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> (Vec<u8>, ValueKind, Vec<u8>) {
        (key.into(), ValueKind::Inline, value.into())
    }

    /// Convenience constructor for a blob index entry
    pub fn blob(key: impl Into<Vec<u8>>, index: &BlobIndex) -> (Vec<u8>, ValueKind, Vec<u8>) {
        (key.into(), ValueKind::BlobIndex, index.encode())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IndexIterator for MemIterator {
    fn valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn seek_to_first(&mut self) {
        self.pos = 0;
    }

    fn seek(&mut self, target: &[u8]) {
        self.pos = self
            .entries
            .partition_point(|(key, _, _)| key.as_slice() < target);
    }

    fn next(&mut self) {
        debug_assert!(self.valid());
        self.pos += 1;
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos].0
    }

    fn value(&self) -> &[u8] {
        &self.entries[self.pos].2
    }

    fn is_blob(&self) -> bool {
        self.entries[self.pos].1 == ValueKind::BlobIndex
    }

    fn status(&self) -> Result<()> {
        Ok(())
    }
}
