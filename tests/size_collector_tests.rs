//! Tests for BlobFileSizeCollector and FileSizeMap
//!
//! These tests verify:
//! - Per-file sums of blob sizes across a table build
//! - Property encoding and strict decoding
//! - Merge semantics across tables

use std::path::Path;

use blobkv::collector::{
    BlobFileSizeCollector, FileSizeMap, Properties, PropertiesCollector, BLOB_FILE_SIZES_PROPERTY,
};
use blobkv::table::{SSTableBuilder, SSTableReader};
use blobkv::{BlobError, BlobIndex, ValueKind};
use tempfile::TempDir;

fn build_table(path: &Path, entries: &[(Vec<u8>, Option<BlobIndex>)]) -> SSTableReader {
    let mut builder =
        SSTableBuilder::with_collectors(path, vec![Box::new(BlobFileSizeCollector::new())])
            .unwrap();
    for (key, index) in entries {
        match index {
            Some(index) => builder.add_blob_index(key, index).unwrap(),
            None => builder.add(key, b"inline").unwrap(),
        }
    }
    builder.finish().unwrap();
    SSTableReader::open(path).unwrap()
}

fn key(i: usize) -> Vec<u8> {
    format!("{:04}", i).into_bytes()
}

fn map(entries: &[(u64, u64)]) -> FileSizeMap {
    entries.iter().copied().collect()
}

// =============================================================================
// Collector Tests
// =============================================================================

#[test]
fn test_sizes_summed_per_blob_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sizes.sst");

    let entries: Vec<_> = (0..100)
        .map(|i| {
            let file_number = if i % 2 == 0 { 1 } else { 2 };
            (key(i), Some(BlobIndex::new(file_number, 8 + i as u64 * 10, 10)))
        })
        .collect();
    let reader = build_table(&path, &entries);

    let sizes = reader.blob_file_sizes().unwrap().unwrap();
    assert_eq!(sizes.len(), 2);
    assert_eq!(sizes.get(1), Some(500));
    assert_eq!(sizes.get(2), Some(500));
    assert_eq!(sizes.total_bytes(), 1000);

    let raw = reader.property(BLOB_FILE_SIZES_PROPERTY).unwrap();
    assert_eq!(FileSizeMap::decode(raw).unwrap(), sizes);
}

#[test]
fn test_inline_entries_ignored() {
    let mut collector = BlobFileSizeCollector::new();

    collector.add(b"a", b"inline value", ValueKind::Inline).unwrap();
    collector
        .add(b"b", &BlobIndex::new(3, 8, 42).encode(), ValueKind::BlobIndex)
        .unwrap();
    collector.add(b"c", b"\x01\x02", ValueKind::Inline).unwrap();

    assert_eq!(collector.sizes(), &map(&[(3, 42)]));
}

#[test]
fn test_sum_independent_of_order() {
    let indexes = [
        BlobIndex::new(5, 8, 100),
        BlobIndex::new(2, 8, 7),
        BlobIndex::new(5, 108, 23),
        BlobIndex::new(9, 8, 1),
        BlobIndex::new(2, 15, 3),
    ];

    let mut forward = BlobFileSizeCollector::new();
    for index in &indexes {
        forward.add(b"k", &index.encode(), ValueKind::BlobIndex).unwrap();
    }

    let mut backward = BlobFileSizeCollector::new();
    for index in indexes.iter().rev() {
        backward.add(b"k", &index.encode(), ValueKind::BlobIndex).unwrap();
    }

    assert_eq!(forward.sizes(), backward.sizes());
    assert_eq!(forward.sizes(), &map(&[(2, 10), (5, 123), (9, 1)]));
}

#[test]
fn test_malformed_blob_index_rejected() {
    let mut collector = BlobFileSizeCollector::new();

    let result = collector.add(b"k", &[0x01, 0x80], ValueKind::BlobIndex);
    assert!(matches!(result, Err(BlobError::Decode(_))));

    let result = collector.add(b"k", &[], ValueKind::BlobIndex);
    assert!(matches!(result, Err(BlobError::Decode(_))));
}

#[test]
fn test_finish_emits_single_property() {
    let mut collector = BlobFileSizeCollector::new();
    collector
        .add(b"k", &BlobIndex::new(1, 8, 64).encode(), ValueKind::BlobIndex)
        .unwrap();

    let properties = collector.finish().unwrap();

    assert_eq!(properties.len(), 1);
    let encoded = properties.get(BLOB_FILE_SIZES_PROPERTY).unwrap();
    assert_eq!(FileSizeMap::decode(encoded).unwrap(), map(&[(1, 64)]));
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_decode() {
    let cases = [
        map(&[]),
        map(&[(1, 1)]),
        map(&[(0, 0), (1, 500), (2, 500)]),
        map(&[(u64::MAX, u64::MAX), (127, 128), (128, 16_384)]),
    ];

    for sizes in cases {
        let decoded = FileSizeMap::decode(&sizes.encode()).unwrap();
        assert_eq!(decoded, sizes);
    }
}

#[test]
fn test_empty_map_encoding() {
    let sizes = FileSizeMap::new();
    assert_eq!(sizes.encode(), vec![0]);
    assert!(FileSizeMap::decode(&[0]).unwrap().is_empty());
}

#[test]
fn test_encoding_layout() {
    let sizes = map(&[(2, 500), (1, 3)]);
    // count, then ascending (file, size) varints
    assert_eq!(sizes.encode(), vec![2, 1, 3, 2, 0xF4, 0x03]);
}

#[test]
fn test_every_truncation_is_corrupt() {
    let encoded = map(&[(1, 500), (2, 500), (300, 70_000)]).encode();

    for len in 0..encoded.len() {
        let result = FileSizeMap::decode(&encoded[..len]);
        assert!(
            matches!(result, Err(BlobError::CorruptProperty(_))),
            "prefix of {} bytes decoded as {:?}",
            len,
            result
        );
    }
}

#[test]
fn test_trailing_bytes_are_corrupt() {
    let mut encoded = map(&[(1, 10)]).encode();
    encoded.push(0);

    let result = FileSizeMap::decode(&encoded);
    assert!(matches!(result, Err(BlobError::CorruptProperty(_))));
}

#[test]
fn test_duplicate_file_number_is_corrupt() {
    let result = FileSizeMap::decode(&[2, 1, 5, 1, 6]);
    assert!(matches!(result, Err(BlobError::CorruptProperty(_))));
}

#[test]
fn test_huge_count_is_corrupt() {
    let result = FileSizeMap::decode(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 1, 1]);
    assert!(matches!(result, Err(BlobError::CorruptProperty(_))));
}

// =============================================================================
// Merge Tests
// =============================================================================

#[test]
fn test_merge_sums_per_file() {
    let mut a = map(&[(1, 10), (2, 20)]);
    a.merge(&map(&[(2, 5), (3, 7)]));

    assert_eq!(a, map(&[(1, 10), (2, 25), (3, 7)]));
}

#[test]
fn test_merge_commutative_and_associative() {
    let a = map(&[(1, 10), (4, 1)]);
    let b = map(&[(1, 3), (2, 8)]);
    let c = map(&[(2, 2), (4, 9), (7, 7)]);

    let mut ab = a.clone();
    ab.merge(&b);
    let mut ba = b.clone();
    ba.merge(&a);
    assert_eq!(ab, ba);

    let mut ab_c = ab.clone();
    ab_c.merge(&c);
    let mut bc = b.clone();
    bc.merge(&c);
    let mut a_bc = a.clone();
    a_bc.merge(&bc);
    assert_eq!(ab_c, a_bc);

    let mut with_empty = a.clone();
    with_empty.merge(&FileSizeMap::new());
    assert_eq!(with_empty, a);
}

#[test]
fn test_merged_tables_equal_union() {
    let temp_dir = TempDir::new().unwrap();

    let first: Vec<_> = (0..10)
        .map(|i| (key(i), Some(BlobIndex::new(1 + i as u64 % 3, 8, 4))))
        .collect();
    let second: Vec<_> = (10..16)
        .map(|i| (key(i), Some(BlobIndex::new(2, 8, 6))))
        .collect();

    let first_sizes = build_table(&temp_dir.path().join("1.sst"), &first)
        .blob_file_sizes()
        .unwrap()
        .unwrap();
    let second_sizes = build_table(&temp_dir.path().join("2.sst"), &second)
        .blob_file_sizes()
        .unwrap()
        .unwrap();

    let mut merged = first_sizes.clone();
    merged.merge(&second_sizes);

    let all: Vec<_> = first.into_iter().chain(second).collect();
    let union = build_table(&temp_dir.path().join("all.sst"), &all)
        .blob_file_sizes()
        .unwrap()
        .unwrap();

    assert_eq!(merged, union);
    assert_eq!(merged, map(&[(1, 16), (2, 48), (3, 12)]));
}

// =============================================================================
// Table Property Tests
// =============================================================================

#[test]
fn test_table_without_blobs_has_empty_sizes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("inline.sst");

    let entries: Vec<_> = (0..5).map(|i| (key(i), None)).collect();
    let reader = build_table(&path, &entries);

    let sizes = reader.blob_file_sizes().unwrap().unwrap();
    assert!(sizes.is_empty());
}

#[test]
fn test_table_without_collector_has_no_sizes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("plain.sst");

    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder
        .add_blob_index(b"k", &BlobIndex::new(1, 8, 10))
        .unwrap();
    builder.finish().unwrap();

    let reader = SSTableReader::open(&path).unwrap();
    assert!(reader.blob_file_sizes().unwrap().is_none());
    assert!(reader.properties().is_empty());
}

/// Writes a garbage value under the blob sizes property name
struct CorruptSizesCollector;

impl PropertiesCollector for CorruptSizesCollector {
    fn name(&self) -> &'static str {
        "CorruptSizesCollector"
    }

    fn add(&mut self, _key: &[u8], _value: &[u8], _kind: ValueKind) -> blobkv::Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> blobkv::Result<Properties> {
        let mut properties = Properties::new();
        properties.insert(BLOB_FILE_SIZES_PROPERTY.to_string(), vec![3, 1]);
        Ok(properties)
    }
}

#[test]
fn test_corrupt_table_property_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("corrupt.sst");

    let mut builder =
        SSTableBuilder::with_collectors(&path, vec![Box::new(CorruptSizesCollector)]).unwrap();
    builder.add(b"k", b"v").unwrap();
    builder.finish().unwrap();

    let reader = SSTableReader::open(&path).unwrap();
    assert!(matches!(
        reader.blob_file_sizes(),
        Err(BlobError::CorruptProperty(_))
    ));
}
