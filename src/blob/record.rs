//! Blob records
//!
//! Codec for the records stored in blob files, and the pinned form an
//! iterator hands out once a record has been resolved.

use std::ops::Deref;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{BlobError, Result};
use crate::varint::{get_varint, put_varint, varint_len};

/// Record header size: CRC32 (4) + BodyLen (4) + Compression (1) = 9 bytes
pub const RECORD_HEADER_SIZE: usize = 9;

/// Per-record bookkeeping added to the cache charge of a resolved record
const RECORD_CHARGE_OVERHEAD: usize = std::mem::size_of::<BlobRecord>();

/// Compression applied to a record body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionType {
    None = 0,
}

impl TryFrom<u8> for CompressionType {
    type Error = BlobError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CompressionType::None),
            other => Err(BlobError::Decode(format!(
                "Unsupported blob compression type: {}",
                other
            ))),
        }
    }
}

/// A key and its out-of-line value, as stored in a blob file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    pub key: Bytes,
    pub value: Bytes,
}

impl BlobRecord {
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Length of the encoded record, header included
    ///
    /// This is the `size` of the `BlobHandle` that points at the record.
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.body_len()
    }

    fn body_len(&self) -> usize {
        varint_len(self.key.len() as u64)
            + self.key.len()
            + varint_len(self.value.len() as u64)
            + self.value.len()
    }

    /// Bytes accounted to this record when it is held by a cache
    pub fn charge(&self) -> usize {
        self.key.len() + self.value.len() + RECORD_CHARGE_OVERHEAD
    }

    /// Append the encoded record to `buf`
    pub fn encode_to(&self, buf: &mut Vec<u8>) {
        let body_len = self.body_len();
        let start = buf.len();
        buf.reserve(RECORD_HEADER_SIZE + body_len);

        // CRC placeholder, patched once the body is written
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(&(body_len as u32).to_le_bytes());
        buf.push(CompressionType::None as u8);

        put_varint(buf, self.key.len() as u64);
        buf.extend_from_slice(&self.key);
        put_varint(buf, self.value.len() as u64);
        buf.extend_from_slice(&self.value);

        let crc = crc32fast::hash(&buf[start + 8..]);
        buf[start..start + 4].copy_from_slice(&crc.to_le_bytes());
    }

    /// Decode one record occupying exactly `bytes`
    pub fn decode(bytes: &[u8], verify_checksum: bool) -> Result<Self> {
        if bytes.len() < RECORD_HEADER_SIZE {
            return Err(BlobError::Decode(format!(
                "Blob record too short: {} bytes",
                bytes.len()
            )));
        }

        let crc = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let body_len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        CompressionType::try_from(bytes[8])?;

        if bytes.len() != RECORD_HEADER_SIZE + body_len {
            return Err(BlobError::Decode(format!(
                "Blob record length mismatch: header says {} body bytes, got {}",
                body_len,
                bytes.len() - RECORD_HEADER_SIZE
            )));
        }

        if verify_checksum {
            let actual = crc32fast::hash(&bytes[8..]);
            if actual != crc {
                return Err(BlobError::Corruption(format!(
                    "Blob record checksum mismatch: expected {:08x}, got {:08x}",
                    crc, actual
                )));
            }
        }

        let mut body = &bytes[RECORD_HEADER_SIZE..];
        let key = take_prefixed(&mut body, "key")?;
        let value = take_prefixed(&mut body, "value")?;

        if !body.is_empty() {
            return Err(BlobError::Decode(format!(
                "Blob record: {} trailing bytes",
                body.len()
            )));
        }

        Ok(Self {
            key: Bytes::copy_from_slice(key),
            value: Bytes::copy_from_slice(value),
        })
    }
}

/// Read a varint length followed by that many bytes
fn take_prefixed<'a>(input: &mut &'a [u8], what: &str) -> Result<&'a [u8]> {
    let len = get_varint(input)
        .ok_or_else(|| BlobError::Decode(format!("Blob record: invalid {} length", what)))?
        as usize;

    if input.len() < len {
        return Err(BlobError::Decode(format!(
            "Blob record: incomplete {} (expected {}, got {})",
            what,
            len,
            input.len()
        )));
    }

    let (head, rest) = input.split_at(len);
    *input = rest;
    Ok(head)
}

// =============================================================================
// Pinned Records
// =============================================================================

/// A resolved record as exposed by an iterator
///
/// Either shared with the value cache or exclusively owned. Dropping it is
/// the release action in both cases: a cached entry loses one reference, an
/// owned record is freed.
#[derive(Debug, Clone)]
pub enum PinnedRecord {
    Cached(Arc<BlobRecord>),
    Owned(BlobRecord),
}

impl PinnedRecord {
    pub fn is_cached(&self) -> bool {
        matches!(self, PinnedRecord::Cached(_))
    }
}

impl Deref for PinnedRecord {
    type Target = BlobRecord;

    fn deref(&self) -> &BlobRecord {
        match self {
            PinnedRecord::Cached(record) => record,
            PinnedRecord::Owned(record) => record,
        }
    }
}
