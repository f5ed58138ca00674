//! Blob Prefetcher
//!
//! Reads records out of one blob file, optimized for ascending-offset access.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::config::ReadOptions;
use crate::error::{BlobError, Result};

use super::{check_file_header, BlobHandle, BlobRecord, BLOB_FILE_HEADER_SIZE, RECORD_HEADER_SIZE};

/// Fetches records from a single blob file
pub trait BlobPrefetcher: Send {
    /// Read and decode the record `handle` points at
    fn get(&mut self, options: &ReadOptions, handle: &BlobHandle) -> Result<BlobRecord>;
}

/// Hands out prefetchers by blob file number
///
/// Shared by every iterator reading the same storage, so implementations
/// must be safe for concurrent use.
pub trait PrefetcherFactory: Send + Sync {
    fn new_prefetcher(&self, file_number: u64) -> Result<Box<dyn BlobPrefetcher>>;
}

/// File-backed prefetcher with an adaptive readahead window
///
/// A read that starts where the previous one ended doubles the window (up
/// to `max_readahead`); any other read shrinks it back to `min_readahead`.
pub struct BlobFilePrefetcher {
    file_number: u64,
    file: File,
    file_size: u64,
    /// Bytes read ahead, starting at `buffer_offset`
    buffer: Vec<u8>,
    buffer_offset: u64,
    /// End offset of the last record served
    last_end: u64,
    readahead: usize,
    min_readahead: usize,
    max_readahead: usize,
}

impl BlobFilePrefetcher {
    /// Open a blob file and validate its header
    pub fn open(
        path: &Path,
        file_number: u64,
        min_readahead: usize,
        max_readahead: usize,
    ) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < BLOB_FILE_HEADER_SIZE {
            return Err(BlobError::Corruption(format!(
                "Blob file {} is {} bytes, shorter than its header",
                file_number, file_size
            )));
        }

        let mut header = [0u8; BLOB_FILE_HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        check_file_header(&header)?;

        Ok(Self {
            file_number,
            file,
            file_size,
            buffer: Vec::new(),
            buffer_offset: 0,
            last_end: BLOB_FILE_HEADER_SIZE,
            readahead: min_readahead,
            min_readahead,
            max_readahead: max_readahead.max(min_readahead),
        })
    }

    pub fn file_number(&self) -> u64 {
        self.file_number
    }

    /// Current readahead window (in bytes)
    pub fn readahead_size(&self) -> usize {
        self.readahead
    }

    fn is_buffered(&self, handle: &BlobHandle) -> bool {
        handle.offset >= self.buffer_offset
            && handle.end() <= self.buffer_offset + self.buffer.len() as u64
    }

    /// Replace the buffer with `len` bytes starting at `offset` (clamped to EOF)
    fn fill(&mut self, offset: u64, len: usize) -> Result<()> {
        let len = len.min((self.file_size - offset) as usize);
        self.file.seek(SeekFrom::Start(offset))?;
        self.buffer.resize(len, 0);
        self.file.read_exact(&mut self.buffer)?;
        self.buffer_offset = offset;
        Ok(())
    }
}

impl BlobPrefetcher for BlobFilePrefetcher {
    fn get(&mut self, options: &ReadOptions, handle: &BlobHandle) -> Result<BlobRecord> {
        if handle.offset < BLOB_FILE_HEADER_SIZE
            || handle.size < RECORD_HEADER_SIZE as u64
            || handle.end() > self.file_size
        {
            return Err(BlobError::Corruption(format!(
                "Blob handle (offset {}, size {}) outside blob file {} of {} bytes",
                handle.offset, handle.size, self.file_number, self.file_size
            )));
        }

        if handle.offset == self.last_end {
            let grown = (self.readahead * 2).min(self.max_readahead);
            if grown != self.readahead {
                tracing::trace!(
                    file_number = self.file_number,
                    readahead = grown,
                    "Growing blob readahead"
                );
            }
            self.readahead = grown;
        } else {
            self.readahead = self.min_readahead;
        }

        if !self.is_buffered(handle) {
            self.fill(handle.offset, (handle.size as usize).max(self.readahead))?;
        }

        let start = (handle.offset - self.buffer_offset) as usize;
        let bytes = &self.buffer[start..start + handle.size as usize];
        let record = BlobRecord::decode(bytes, options.verify_checksums)?;

        self.last_end = handle.end();
        Ok(record)
    }
}
