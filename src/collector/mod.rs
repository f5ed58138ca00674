//! Collector Module
//!
//! Table properties collectors: observers fed every entry while an index
//! segment is built, whose output is stored as named properties of the
//! finished segment.

mod blob_size;

use std::collections::BTreeMap;

use crate::blob::ValueKind;
use crate::error::Result;

pub use blob_size::{BlobFileSizeCollector, FileSizeMap, BLOB_FILE_SIZES_PROPERTY};

/// Named opaque properties attached to a finished segment
pub type Properties = BTreeMap<String, Vec<u8>>;

/// Observer of the entries written into one index segment
pub trait PropertiesCollector: Send {
    fn name(&self) -> &'static str;

    /// Called once per entry, in index order
    fn add(&mut self, key: &[u8], value: &[u8], kind: ValueKind) -> Result<()>;

    /// Called once after the last entry
    fn finish(&mut self) -> Result<Properties>;
}
