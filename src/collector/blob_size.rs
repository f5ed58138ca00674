//! Blob file size collector
//!
//! Tracks how many live bytes each blob file backs within one index
//! segment. Garbage collection uses the totals to pick blob files worth
//! rewriting.
//!
//! ## Property Format
//! ```text
//! [EntryCount: varint]
//! [FileNumber: varint][Size: varint]   ... EntryCount times, ascending file number
//! ```

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::blob::{BlobIndex, ValueKind};
use crate::error::{BlobError, Result};
use crate::varint::{get_varint, put_varint};

use super::{Properties, PropertiesCollector};

/// Name of the property holding the encoded `FileSizeMap`
pub const BLOB_FILE_SIZES_PROPERTY: &str = "blobkv.blob-file-sizes";

/// Smallest encoding of one entry: two single-byte varints
const MIN_ENTRY_LEN: usize = 2;

/// Live blob bytes per blob file number
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSizeMap(BTreeMap<u64, u64>);

impl FileSizeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `size` bytes to `file_number`'s total
    pub fn add(&mut self, file_number: u64, size: u64) {
        let total = self.0.entry(file_number).or_insert(0);
        *total = total.saturating_add(size);
    }

    pub fn get(&self, file_number: u64) -> Option<u64> {
        self.0.get(&file_number).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// (file number, bytes), ascending by file number
    pub fn iter(&self) -> btree_map::Iter<'_, u64, u64> {
        self.0.iter()
    }

    /// Sum over all files
    pub fn total_bytes(&self) -> u64 {
        self.0.values().fold(0u64, |acc, size| acc.saturating_add(*size))
    }

    /// Fold `other` into `self` (key-wise sum)
    pub fn merge(&mut self, other: &FileSizeMap) {
        for (&file_number, &size) in other.iter() {
            self.add(file_number, size);
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + self.0.len() * 2 * crate::varint::MAX_VARINT_LEN);
        put_varint(&mut buf, self.0.len() as u64);
        for (&file_number, &size) in &self.0 {
            put_varint(&mut buf, file_number);
            put_varint(&mut buf, size);
        }
        buf
    }

    /// Decode a property produced by `encode`
    ///
    /// Fails with `CorruptProperty` if the count does not match the entries
    /// present, an entry is cut short, or a file number repeats.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut input = bytes;

        let count = get_varint(&mut input).ok_or_else(|| {
            BlobError::CorruptProperty("blob file sizes: missing entry count".to_string())
        })?;

        if count > (input.len() / MIN_ENTRY_LEN) as u64 {
            return Err(BlobError::CorruptProperty(format!(
                "blob file sizes: {} entries declared but only {} bytes follow",
                count,
                input.len()
            )));
        }

        let mut sizes = BTreeMap::new();
        for i in 0..count {
            let (file_number, size) = match (get_varint(&mut input), get_varint(&mut input)) {
                (Some(file_number), Some(size)) => (file_number, size),
                _ => {
                    return Err(BlobError::CorruptProperty(format!(
                        "blob file sizes: truncated at entry {} of {}",
                        i, count
                    )))
                }
            };

            if sizes.insert(file_number, size).is_some() {
                return Err(BlobError::CorruptProperty(format!(
                    "blob file sizes: duplicate file number {}",
                    file_number
                )));
            }
        }

        if !input.is_empty() {
            return Err(BlobError::CorruptProperty(format!(
                "blob file sizes: {} bytes left after {} entries",
                input.len(),
                count
            )));
        }

        Ok(Self(sizes))
    }
}

impl FromIterator<(u64, u64)> for FileSizeMap {
    fn from_iter<T: IntoIterator<Item = (u64, u64)>>(iter: T) -> Self {
        let mut map = FileSizeMap::new();
        for (file_number, size) in iter {
            map.add(file_number, size);
        }
        map
    }
}

impl<'a> IntoIterator for &'a FileSizeMap {
    type Item = (&'a u64, &'a u64);
    type IntoIter = btree_map::Iter<'a, u64, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Collector producing `BLOB_FILE_SIZES_PROPERTY`
#[derive(Debug, Default)]
pub struct BlobFileSizeCollector {
    sizes: FileSizeMap,
}

impl BlobFileSizeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Totals collected so far
    pub fn sizes(&self) -> &FileSizeMap {
        &self.sizes
    }
}

impl PropertiesCollector for BlobFileSizeCollector {
    fn name(&self) -> &'static str {
        "BlobFileSizeCollector"
    }

    fn add(&mut self, _key: &[u8], value: &[u8], kind: ValueKind) -> Result<()> {
        if kind != ValueKind::BlobIndex {
            return Ok(());
        }

        let index = BlobIndex::decode(value)?;
        self.sizes.add(index.file_number, index.handle.size);
        Ok(())
    }

    fn finish(&mut self) -> Result<Properties> {
        let mut properties = Properties::new();
        properties.insert(BLOB_FILE_SIZES_PROPERTY.to_string(), self.sizes.encode());
        Ok(properties)
    }
}
