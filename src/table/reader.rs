//! Table Reader
//!
//! Opens table files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::blob::ValueKind;
use crate::collector::{FileSizeMap, Properties, BLOB_FILE_SIZES_PROPERTY};
use crate::error::{BlobError, Result};

use super::cursor::{read_entry, SSTableCursor};
use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Reader for table files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    /// File handle for reading entries
    file: BufReader<File>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    /// Properties written by the collectors at build time
    properties: Properties,
    /// Metadata
    entry_count: u64,
    /// Index block starting offset (end of data block)
    index_offset: u64,
}

impl SSTableReader {
    /// Open a table for reading
    ///
    /// Loads the entire index and the properties block into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(BlobError::Storage(format!(
                "Table too small: {} bytes",
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(BlobError::Storage(format!(
                "Invalid table magic: expected BKVT, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(BlobError::Storage(format!(
                "Unsupported table version: {}",
                version
            )));
        }

        let entry_count = read_u64(&header[6..14]);

        // Read footer to get block offsets
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = read_u64(&footer[0..8]);
        let properties_offset = read_u64(&footer[8..16]);
        // Note: the data CRC in footer[16..20] is not validated on open

        let properties_end = file_size - FOOTER_SIZE;
        if index_offset < HEADER_SIZE
            || properties_offset < index_offset
            || properties_offset > properties_end
        {
            return Err(BlobError::Storage(format!(
                "Invalid table footer: index at {}, properties at {}, file size {}",
                index_offset, properties_offset, file_size
            )));
        }

        // Load index and properties blocks into memory
        file.seek(SeekFrom::Start(index_offset))?;
        let mut index_data = vec![0u8; (properties_offset - index_offset) as usize];
        file.read_exact(&mut index_data)?;
        let mut properties_data = vec![0u8; (properties_end - properties_offset) as usize];
        file.read_exact(&mut properties_data)?;

        let index = parse_index(&index_data)?;
        let properties = parse_properties(&properties_data)?;

        // Reset file to start for reading
        file.seek(SeekFrom::Start(0))?;

        Ok(Self {
            file: BufReader::new(file),
            index,
            properties,
            entry_count,
            index_offset,
        })
    }

    /// Get a value by key: O(log n) lookup via in-memory index
    ///
    /// Returns:
    /// - `Ok((kind, value))`: key found; `value` is an encoded `BlobIndex`
    ///   when `kind` is `ValueKind::BlobIndex`
    /// - `Err(KeyNotFound)`: key not in this table
    pub fn get(&mut self, key: &[u8]) -> Result<(ValueKind, Vec<u8>)> {
        // O(log n) lookup in BTreeMap
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Err(BlobError::KeyNotFound),
        };

        // Seek directly to the entry
        self.file.seek(SeekFrom::Start(offset))?;
        let (_key, value, kind) = read_entry(&mut self.file)?;

        Ok((kind, value))
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the minimum key in this table (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this table (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this table (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty table
        }
    }

    /// All properties stored with this table
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// A single property by name
    pub fn property(&self, name: &str) -> Option<&[u8]> {
        self.properties.get(name).map(|v| v.as_slice())
    }

    /// Decoded per-blob-file sizes, if the table was built with a
    /// `BlobFileSizeCollector`
    ///
    /// A corrupt property is an error, never an empty map.
    pub fn blob_file_sizes(&self) -> Result<Option<FileSizeMap>> {
        self.property(BLOB_FILE_SIZES_PROPERTY)
            .map(FileSizeMap::decode)
            .transpose()
    }

    /// Create a cursor over all entries
    pub fn cursor(&mut self) -> SSTableCursor<'_> {
        SSTableCursor::new(&mut self.file, &self.index, self.index_offset)
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Parse index entries: [key_len(4)][offset(8)][key]
fn parse_index(data: &[u8]) -> Result<BTreeMap<Vec<u8>, u64>> {
    let mut index = BTreeMap::new();
    let mut pos = 0;

    while pos < data.len() {
        if pos + 12 > data.len() {
            return Err(BlobError::Storage("Truncated table index entry".to_string()));
        }
        let key_len = read_u32(&data[pos..]) as usize;
        let offset = read_u64(&data[pos + 4..]);
        pos += 12;

        if pos + key_len > data.len() {
            return Err(BlobError::Storage("Truncated table index key".to_string()));
        }
        index.insert(data[pos..pos + key_len].to_vec(), offset);
        pos += key_len;
    }

    Ok(index)
}

/// Parse properties: [count(4)] then [name_len(4)][val_len(4)][name][value]
fn parse_properties(data: &[u8]) -> Result<Properties> {
    if data.len() < 4 {
        return Err(BlobError::Storage("Missing table properties block".to_string()));
    }

    let count = read_u32(data);
    let mut properties = Properties::new();
    let mut pos = 4;

    for _ in 0..count {
        if pos + 8 > data.len() {
            return Err(BlobError::Storage("Truncated table property header".to_string()));
        }
        let name_len = read_u32(&data[pos..]) as usize;
        let value_len = read_u32(&data[pos + 4..]) as usize;
        pos += 8;

        if pos + name_len + value_len > data.len() {
            return Err(BlobError::Storage("Truncated table property".to_string()));
        }
        let name = String::from_utf8(data[pos..pos + name_len].to_vec())
            .map_err(|_| BlobError::Storage("Table property name is not UTF-8".to_string()))?;
        pos += name_len;
        properties.insert(name, data[pos..pos + value_len].to_vec());
        pos += value_len;
    }

    Ok(properties)
}
