use hashindex::{ChunkEntry, ChunkIndex, NsEntry, NSIndex};
use tempfile::tempdir;

use crate::util::h;

#[test]
fn ns_index_lifecycle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ns.idx");

    let mut idx = NSIndex::new();
    assert_eq!(idx.len(), 0);
    for x in 0..100 {
        idx.insert(
            &h(x),
            NsEntry {
                segment: x as u32,
                offset: x as u32,
            },
        )
        .unwrap();
    }
    assert_eq!(idx.len(), 100);
    for x in 0..100 {
        assert_eq!(idx.get(&h(x)).unwrap().segment, x as u32);
    }

    // updating in place keeps the length
    for x in 0..100 {
        idx.insert(
            &h(x),
            NsEntry {
                segment: x as u32 * 2,
                offset: x as u32,
            },
        )
        .unwrap();
    }
    assert_eq!(idx.len(), 100);
    for x in 0..100 {
        assert_eq!(idx.get(&h(x)).unwrap().segment, x as u32 * 2);
    }

    for x in 0..50 {
        idx.remove(&h(x)).unwrap();
    }
    for x in 50..100 {
        assert!(idx.contains(&h(x)));
    }
    for x in 0..50 {
        assert!(!idx.contains(&h(x)));
        assert!(idx.remove(&h(x)).is_err());
    }
    assert_eq!(idx.len(), 50);

    idx.write(&path).unwrap();
    let mut idx = NSIndex::read(&path).unwrap();
    assert_eq!(idx.len(), 50);
    for x in 50..100 {
        assert_eq!(idx.get(&h(x)).unwrap().segment, x as u32 * 2);
    }

    idx.clear();
    assert_eq!(idx.len(), 0);
    idx.write(&path).unwrap();
    assert_eq!(NSIndex::read(&path).unwrap().len(), 0);
}

#[test]
fn chunk_index_lifecycle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chunks.idx");

    let mut idx = ChunkIndex::new();
    for x in 0..100 {
        idx.insert(
            &h(x),
            ChunkEntry {
                refcount: x as u32,
                size: x as u32,
                csize: x as u32,
            },
        )
        .unwrap();
    }
    for x in 0..50 {
        idx.remove(&h(x)).unwrap();
    }
    assert_eq!(idx.len(), 50);

    idx.write(&path).unwrap();
    let idx = ChunkIndex::read(&path).unwrap();
    assert_eq!(idx.len(), 50);
    for x in 50..100 {
        assert_eq!(
            idx.get(&h(x)),
            Some(ChunkEntry {
                refcount: x as u32,
                size: x as u32,
                csize: x as u32,
            })
        );
    }
}

#[test]
fn iteration_resumes_after_marker() {
    let mut idx = NSIndex::new();
    for x in 0..100 {
        idx.insert(
            &h(x),
            NsEntry {
                segment: x as u32,
                offset: x as u32,
            },
        )
        .unwrap();
    }

    let all: Vec<_> = idx.iter().map(|(key, entry)| (*key, entry)).collect();
    assert_eq!(all.len(), 100);

    let marker = all[49].0;
    let second_half: Vec<_> = idx
        .iter_from(&marker)
        .unwrap()
        .map(|(key, entry)| (*key, entry))
        .collect();
    assert_eq!(second_half.len(), 50);
    assert_eq!(second_half, all[50..]);

    assert!(idx.iter_from(&h(100_000)).is_err());
}

#[test]
fn iterator_is_exhausted_after_last_entry() {
    let mut idx = NSIndex::new();
    for x in 0..10 {
        idx.insert(
            &h(x),
            NsEntry {
                segment: x as u32,
                offset: 0,
            },
        )
        .unwrap();
    }
    let mut iter = idx.iter();
    assert_eq!(iter.by_ref().count(), 10);
    assert!(iter.next().is_none());
    assert!(iter.next().is_none());
}
