//! Table Builder
//!
//! Writes sorted index entries to a new table file, feeding every entry to
//! the registered properties collectors.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::blob::{BlobIndex, ValueKind};
use crate::collector::{Properties, PropertiesCollector};
use crate::error::{BlobError, Result};

use super::{kind_to_byte, SSTable, ENTRY_HEADER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Builder for creating new tables from sorted entries
pub struct SSTableBuilder {
    /// Output file path
    path: std::path::PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Number of entries written
    entry_count: u64,
    blob_entry_count: u64,
    /// Current write position (for index)
    current_offset: u64,
    /// Index: key → file offset of entry
    index: Vec<(Vec<u8>, u64)>,
    /// Track min/max keys for metadata
    min_key: Option<Vec<u8>>,
    max_key: Option<Vec<u8>>,
    /// Running CRC hasher for data section
    data_hasher: crc32fast::Hasher,
    /// Observers whose output becomes the properties block
    collectors: Vec<Box<dyn PropertiesCollector>>,
}

impl SSTableBuilder {
    /// Create a new table builder without collectors
    pub fn new(path: &Path) -> Result<Self> {
        Self::with_collectors(path, Vec::new())
    }

    /// Create a new table builder
    ///
    /// Writes header immediately; call `add()`/`add_blob_index()` in sorted
    /// order, then `finish()` to write index, properties and footer.
    pub fn with_collectors(
        path: &Path,
        collectors: Vec<Box<dyn PropertiesCollector>>,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        // Write header (entry_count placeholder, will be updated in finish)
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?; // Placeholder for entry count

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            entry_count: 0,
            blob_entry_count: 0,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            min_key: None,
            max_key: None,
            data_hasher: crc32fast::Hasher::new(),
            collectors,
        })
    }

    /// Add a key with an inline value (must be called in sorted key order)
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_entry(key, value, ValueKind::Inline)
    }

    /// Add a key whose value lives in a blob file (must be called in sorted key order)
    pub fn add_blob_index(&mut self, key: &[u8], index: &BlobIndex) -> Result<()> {
        self.write_entry(key, &index.encode(), ValueKind::BlobIndex)
    }

    /// Number of entries added so far
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Internal: write an entry
    fn write_entry(&mut self, key: &[u8], value: &[u8], kind: ValueKind) -> Result<()> {
        if let Some(last) = &self.max_key {
            if key <= last.as_slice() {
                return Err(BlobError::Storage(format!(
                    "Keys must be added in strictly increasing order: {:?} after {:?}",
                    key, last
                )));
            }
        }

        for collector in &mut self.collectors {
            collector.add(key, value, kind)?;
        }

        // Record offset for index
        self.index.push((key.to_vec(), self.current_offset));

        // Track min/max keys
        if self.min_key.is_none() {
            self.min_key = Some(key.to_vec());
        }
        self.max_key = Some(key.to_vec());

        // Prepare entry header: [key_len(4)][val_len(4)][kind(1)]
        let mut header = [0u8; ENTRY_HEADER_SIZE as usize];
        header[0..4].copy_from_slice(&(key.len() as u32).to_le_bytes());
        header[4..8].copy_from_slice(&(value.len() as u32).to_le_bytes());
        header[8] = kind_to_byte(kind);

        // Write and accumulate CRC
        self.writer.write_all(&header)?;
        self.writer.write_all(key)?;
        self.writer.write_all(value)?;

        self.data_hasher.update(&header);
        self.data_hasher.update(key);
        self.data_hasher.update(value);

        self.current_offset += ENTRY_HEADER_SIZE + key.len() as u64 + value.len() as u64;
        self.entry_count += 1;
        if kind == ValueKind::BlobIndex {
            self.blob_entry_count += 1;
        }

        Ok(())
    }

    /// Finish building: write index block, properties, footer, and return metadata
    pub fn finish(mut self) -> Result<SSTable> {
        // Gather collector output before touching the file
        let mut properties = Properties::new();
        for collector in &mut self.collectors {
            let collected = collector.finish()?;
            tracing::trace!(
                collector = collector.name(),
                properties = collected.len(),
                "Collected table properties"
            );
            properties.extend(collected);
        }

        // Record where index block starts
        let index_offset = self.current_offset;

        // Write index block: [key_len(4)][offset(8)][key] for each entry
        let mut properties_offset = index_offset;
        for (key, offset) in &self.index {
            let key_len = key.len() as u32;
            self.writer.write_all(&key_len.to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(key)?;
            properties_offset += 12 + key.len() as u64;
        }

        // Write properties block: [count(4)] then [name_len(4)][val_len(4)][name][value]
        self.writer.write_all(&(properties.len() as u32).to_le_bytes())?;
        for (name, value) in &properties {
            self.writer.write_all(&(name.len() as u32).to_le_bytes())?;
            self.writer.write_all(&(value.len() as u32).to_le_bytes())?;
            self.writer.write_all(name.as_bytes())?;
            self.writer.write_all(value)?;
        }

        // Finalize CRC
        let data_crc = self.data_hasher.finalize();

        // Write footer: index_offset (8) + properties_offset (8) + data_crc (4) + padding (4)
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&properties_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?; // Padding for alignment

        // Flush everything
        self.writer.flush()?;

        // Seek back and update entry count in header
        let mut file = self.writer.into_inner().map_err(|e| {
            BlobError::Storage(format!("Failed to flush table: {}", e))
        })?;
        file.seek(SeekFrom::Start(6))?; // After magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();

        tracing::debug!(
            path = %self.path.display(),
            entries = self.entry_count,
            blob_entries = self.blob_entry_count,
            file_size,
            "Finished index table"
        );

        Ok(SSTable {
            path: self.path,
            entry_count: self.entry_count,
            blob_entry_count: self.blob_entry_count,
            min_key: self.min_key.unwrap_or_default(),
            max_key: self.max_key.unwrap_or_default(),
            file_size,
        })
    }
}
