use std::fs;

use hashindex::{ChunkEntry, ChunkIndex, NsEntry, NSIndex, MAX_VALUE};
use tempfile::tempdir;

use crate::util::{h, scattered};

#[test]
fn emptied_index_restores_original_file_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ns.idx");
    let count = 2000u64;

    let mut idx = NSIndex::new();
    idx.write(&path).unwrap();
    let initial_size = fs::metadata(&path).unwrap().len();

    for x in 0..count {
        idx.insert(
            &h(x),
            NsEntry {
                segment: x as u32,
                offset: x as u32,
            },
        )
        .unwrap();
    }
    idx.write(&path).unwrap();
    assert!(fs::metadata(&path).unwrap().len() > initial_size);

    for x in 0..count {
        idx.remove(&h(x)).unwrap();
    }
    assert_eq!(idx.len(), 0);
    idx.write(&path).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), initial_size);
}

#[test]
fn round_trip_preserves_exact_entries() {
    let mut idx = ChunkIndex::new();
    idx.insert(
        &h(1),
        ChunkEntry {
            refcount: 1,
            size: 2,
            csize: 3,
        },
    )
    .unwrap();
    idx.insert(
        &h(2),
        ChunkEntry {
            refcount: 1 << 31,
            size: 0,
            csize: 0,
        },
    )
    .unwrap();
    idx.insert(
        &h(3),
        ChunkEntry {
            refcount: 0xffff_ecb8,
            size: 0,
            csize: 0,
        },
    )
    .unwrap();

    idx.compact();
    let mut first = Vec::new();
    idx.write_to(&mut first).unwrap();
    let mut second = Vec::new();
    idx.write_to(&mut second).unwrap();
    assert_eq!(first, second);

    let restored = ChunkIndex::read_from(&mut &first[..]).unwrap();
    assert_eq!(restored.len(), 3);
    assert_eq!(restored.get(&h(1)).unwrap().csize, 3);
    assert_eq!(restored.get(&h(2)).unwrap().refcount, 1 << 31);
    assert_eq!(restored.get(&h(3)).unwrap().refcount, 0xffff_ecb8);
}

#[test]
fn merging_into_read_back_index_saturates() {
    let mut idx = ChunkIndex::new();
    idx.insert(
        &h(3),
        ChunkEntry {
            refcount: 0xffff_ecb8,
            size: 0,
            csize: 0,
        },
    )
    .unwrap();
    let mut bytes = Vec::new();
    idx.write_to(&mut bytes).unwrap();
    let mut restored = ChunkIndex::read_from(&mut &bytes[..]).unwrap();

    let mut other = ChunkIndex::new();
    other
        .insert(
            &h(3),
            ChunkEntry {
                refcount: 4_294_843_840, // 2^32 - 123456, still below MAX_VALUE
                size: 6,
                csize: 7,
            },
        )
        .unwrap();
    restored.merge(&other);
    assert_eq!(restored.get(&h(3)).unwrap().refcount, MAX_VALUE);
}

#[test]
fn reported_size_matches_file_length() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chunks.idx");

    let mut idx = ChunkIndex::new();
    for x in 0..1234 {
        idx.insert(
            &scattered(x),
            ChunkEntry {
                refcount: x as u32,
                size: x as u32,
                csize: x as u32,
            },
        )
        .unwrap();
    }
    idx.write(&path).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), idx.size() as u64);

    let empty = ChunkIndex::new();
    assert_eq!(empty.size(), 18 + 1031 * (32 + 3 * 4));
}
