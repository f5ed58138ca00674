//! Blob handles and indexes
//!
//! A `BlobIndex` is what the primary index stores in place of a large value.

use crate::error::{BlobError, Result};
use crate::varint::{get_varint, put_varint};

/// Leading tag byte of an encoded `BlobIndex`
pub const BLOB_INDEX_TAG: u8 = 1;

/// How an entry of the primary index stores its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// The value is stored in the index entry itself
    Inline,

    /// The index entry holds an encoded `BlobIndex`
    BlobIndex,
}

/// Location of one record inside a blob file
///
/// Ordering is by `(offset, size)`, i.e. physical position in the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlobHandle {
    /// Byte offset of the record from the start of the file
    pub offset: u64,
    /// Full record length in bytes (header included)
    pub size: u64,
}

impl BlobHandle {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Offset one past the last byte of the record
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }

    pub fn encode_to(&self, buf: &mut Vec<u8>) {
        put_varint(buf, self.offset);
        put_varint(buf, self.size);
    }

    pub fn decode_from(input: &mut &[u8]) -> Result<Self> {
        let offset = get_varint(input)
            .ok_or_else(|| BlobError::Decode("BlobHandle: invalid offset".to_string()))?;
        let size = get_varint(input)
            .ok_or_else(|| BlobError::Decode("BlobHandle: invalid size".to_string()))?;
        Ok(Self { offset, size })
    }
}

/// Indirection record: which blob file holds a value, and where
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BlobIndex {
    pub file_number: u64,
    pub handle: BlobHandle,
}

impl BlobIndex {
    pub fn new(file_number: u64, offset: u64, size: u64) -> Self {
        Self {
            file_number,
            handle: BlobHandle::new(offset, size),
        }
    }

    /// Encode as an index value: tag (1) + file number, offset, size (varints)
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 3 * crate::varint::MAX_VARINT_LEN);
        self.encode_to(&mut buf);
        buf
    }

    pub fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.push(BLOB_INDEX_TAG);
        put_varint(buf, self.file_number);
        self.handle.encode_to(buf);
    }

    /// Decode an index value produced by `encode`
    ///
    /// The whole input must be consumed.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&tag, mut input) = bytes
            .split_first()
            .ok_or_else(|| BlobError::Decode("BlobIndex: empty input".to_string()))?;

        if tag != BLOB_INDEX_TAG {
            return Err(BlobError::Decode(format!(
                "BlobIndex: unexpected tag 0x{:02x}",
                tag
            )));
        }

        let file_number = get_varint(&mut input)
            .ok_or_else(|| BlobError::Decode("BlobIndex: invalid file number".to_string()))?;
        let handle = BlobHandle::decode_from(&mut input)?;

        if !input.is_empty() {
            return Err(BlobError::Decode(format!(
                "BlobIndex: {} trailing bytes",
                input.len()
            )));
        }

        Ok(Self {
            file_number,
            handle,
        })
    }

    /// Key under which the resolved record is kept in the value cache
    pub fn cache_key(&self) -> BlobCacheKey {
        BlobCacheKey::new(self.file_number, self.handle)
    }
}

/// Value cache key: file number, offset and size, big-endian
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobCacheKey([u8; 24]);

impl BlobCacheKey {
    pub fn new(file_number: u64, handle: BlobHandle) -> Self {
        let mut key = [0u8; 24];
        key[0..8].copy_from_slice(&file_number.to_be_bytes());
        key[8..16].copy_from_slice(&handle.offset.to_be_bytes());
        key[16..24].copy_from_slice(&handle.size.to_be_bytes());
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
