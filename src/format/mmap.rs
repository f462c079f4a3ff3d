//! Read-only memory-mapped index views.
//!
//! Maps a written index file and probes the bucket array in place,
//! without decoding it into an owned table. The mapping must cover the
//! file's exact on-disk footprint and the view is immutable for its
//! whole lifetime; rewriting the file invalidates any open view.

use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{HashIndexError, Result};
use crate::format::{
    on_disk_size, Header, HEADER_SIZE, SENTINEL_DELETED, SENTINEL_EMPTY,
};
use crate::index::chunk::ChunkEntry;
use crate::index::ns::NsEntry;
use crate::index::table::{ideal_position, probe_distance};
use crate::index::{IndexValue, Key, KEY_SIZE};

/// Buckets probed between rich-bucket checks, as in the owned table.
const PROBE_PERIOD: usize = 128;

pub type MappedNSIndex = MappedIndex<NsEntry>;
pub type MappedChunkIndex = MappedIndex<ChunkEntry>;

/// A read-only index backed directly by its on-disk bytes.
pub struct MappedIndex<V: IndexValue> {
    map: Mmap,
    num_entries: usize,
    num_buckets: usize,
    _value: PhantomData<V>,
}

impl<V: IndexValue> MappedIndex<V> {
    /// Maps the index file at `path`.
    ///
    /// The file must carry a valid header for this value width and its
    /// size must match the header's bucket count exactly.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        if (file.metadata()?.len() as usize) < HEADER_SIZE {
            return Err(HashIndexError::Format(
                "unexpected end of index file".into(),
            ));
        }
        // Safety: the mapping is private to this handle and dropped with
        // it; callers must not rewrite the file while a view is open.
        let map = unsafe { Mmap::map(&file)? };
        let mut head = [0u8; HEADER_SIZE];
        head.copy_from_slice(&map[..HEADER_SIZE]);
        let header = Header::decode(&head)?;
        if header.key_size as usize != KEY_SIZE {
            return Err(HashIndexError::Format(format!(
                "unsupported key size {}",
                header.key_size
            )));
        }
        if header.value_size as usize != V::SIZE {
            return Err(HashIndexError::Format(format!(
                "unsupported value size {}",
                header.value_size
            )));
        }
        let num_buckets = header.num_buckets as usize;
        if map.len() != on_disk_size(num_buckets, V::SIZE) {
            return Err(HashIndexError::Format(format!(
                "file size {} does not match {} buckets",
                map.len(),
                num_buckets
            )));
        }
        Ok(Self {
            map,
            num_entries: header.num_entries as usize,
            num_buckets,
            _value: PhantomData,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.num_entries
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    #[inline]
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    #[inline]
    fn bucket_at(&self, pos: usize) -> &[u8] {
        let width = KEY_SIZE + V::SIZE;
        let start = HEADER_SIZE + pos * width;
        &self.map[start..start + width]
    }

    #[inline]
    fn occupancy_word(bucket: &[u8]) -> u32 {
        u32::from_le_bytes([
            bucket[KEY_SIZE],
            bucket[KEY_SIZE + 1],
            bucket[KEY_SIZE + 2],
            bucket[KEY_SIZE + 3],
        ])
    }

    /// Probes for `key`, same walk as the owned table: empty buckets end
    /// the search, tombstones are traversed, and the probe count is
    /// capped at the bucket count.
    pub fn get(&self, key: &Key) -> Option<V> {
        let n = self.num_buckets;
        if n == 0 {
            return None;
        }
        let mut pos = ideal_position(key, n);
        for dist in 0..n {
            let bucket = self.bucket_at(pos);
            match Self::occupancy_word(bucket) {
                SENTINEL_EMPTY => return None,
                SENTINEL_DELETED => {}
                _ => {
                    let stored = &bucket[..KEY_SIZE];
                    if stored == &key[..] {
                        return Some(V::from_raw(&bucket[KEY_SIZE..]));
                    }
                    if (dist + 1) % PROBE_PERIOD == 0
                        && probe_distance(ideal_position(stored, n), pos, n) < dist
                    {
                        return None;
                    }
                }
            }
            pos = if pos + 1 == n { 0 } else { pos + 1 };
        }
        None
    }

    #[inline]
    pub fn contains(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    /// Iterates occupied buckets in bucket order, copying keys and
    /// values out of the mapping.
    pub fn iter(&self) -> MappedIter<'_, V> {
        MappedIter { view: self, pos: 0 }
    }
}

/// Iterator over `(key, value)` pairs of a mapped index.
pub struct MappedIter<'a, V: IndexValue> {
    view: &'a MappedIndex<V>,
    pos: usize,
}

impl<'a, V: IndexValue> Iterator for MappedIter<'a, V> {
    type Item = (Key, V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.view.num_buckets {
            let bucket = self.view.bucket_at(self.pos);
            self.pos += 1;
            match MappedIndex::<V>::occupancy_word(bucket) {
                SENTINEL_EMPTY | SENTINEL_DELETED => {}
                _ => {
                    let mut key = [0u8; KEY_SIZE];
                    key.copy_from_slice(&bucket[..KEY_SIZE]);
                    return Some((key, V::from_raw(&bucket[KEY_SIZE..])));
                }
            }
        }
        None
    }
}
