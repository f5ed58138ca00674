//! Iterator Module
//!
//! Cursor contracts over the primary index and the iterators built on them.
//!
//! ## Cursor Model
//! Iterators here are cursors, not `std::iter::Iterator`s: `key()` and
//! `value()` borrow from the cursor and stay valid until the next call to
//! `next()`. `valid()` must be checked before reading the current entry.

mod memory;
mod unordered;

use std::cmp::Ordering;

use crate::error::Result;

pub use memory::MemIterator;
pub use unordered::{UnorderedIterBuilder, UnorderedIterator, PENDING_ENTRY_CHARGE};

/// Forward cursor over the primary index
pub trait IndexIterator {
    /// Whether the cursor points at an entry
    fn valid(&self) -> bool;

    /// Position at the first entry
    fn seek_to_first(&mut self);

    /// Position at the first entry with key >= `target`
    fn seek(&mut self, target: &[u8]);

    /// Advance to the next entry (requires `valid()`)
    fn next(&mut self);

    /// Current key (requires `valid()`)
    fn key(&self) -> &[u8];

    /// Current value (requires `valid()`); an encoded `BlobIndex` if `is_blob()`
    fn value(&self) -> &[u8];

    /// Whether the current value is an indirection rather than inline data
    fn is_blob(&self) -> bool;

    /// Error that stopped the cursor, if any
    fn status(&self) -> Result<()>;
}

/// Total order over keys, used for bound checks
pub trait Comparator: Send + Sync {
    fn name(&self) -> &'static str;

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Lexicographic byte order
#[derive(Debug, Default, Clone, Copy)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn name(&self) -> &'static str {
        "blobkv.BytewiseComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}
