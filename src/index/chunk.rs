use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::iter::FusedIterator;
use std::path::Path;

use crate::error::{HashIndexError, Result};
use crate::format::{self, MAX_VALUE};
use crate::index::table::{Iter, RawTable};
use crate::index::{IndexValue, Key};

/// Per-chunk bookkeeping: reference count, plaintext size, stored size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkEntry {
    pub refcount: u32,
    pub size: u32,
    pub csize: u32,
}

impl IndexValue for ChunkEntry {
    const SIZE: usize = 12;

    #[inline]
    fn leading_word(&self) -> u32 {
        self.refcount
    }

    fn write_raw(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.refcount.to_le_bytes());
        buf[4..8].copy_from_slice(&self.size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.csize.to_le_bytes());
    }

    fn from_raw(buf: &[u8]) -> Self {
        Self {
            refcount: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            size: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            csize: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        }
    }
}

/// Aggregate chunk statistics, with duplicates weighted by refcount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub size: u64,
    pub csize: u64,
    pub unique_size: u64,
    pub unique_csize: u64,
    pub unique_chunks: u64,
    pub chunks: u64,
}

/// Clamp a refcount sum at [`MAX_VALUE`].
///
/// Once a count reaches the cap its true value is unknown, so it stays
/// there: `incref` and `decref` both leave a saturated count untouched,
/// otherwise a later decrement could free a chunk that is still
/// referenced.
#[inline]
fn saturate(sum: u64) -> u32 {
    if sum >= MAX_VALUE as u64 {
        MAX_VALUE
    } else {
        sum as u32
    }
}

/// Maps a content hash to its reference count and sizes.
pub struct ChunkIndex {
    table: RawTable<ChunkEntry>,
}

impl ChunkIndex {
    pub fn new() -> Self {
        Self {
            table: RawTable::new(),
        }
    }

    /// Presized so `entries` inserts trigger no grow.
    pub fn with_capacity(entries: usize) -> Self {
        Self {
            table: RawTable::with_capacity(entries),
        }
    }

    /// Inserts or overwrites the entry for `key`.
    pub fn insert(&mut self, key: &Key, entry: ChunkEntry) -> Result<()> {
        if entry.refcount > MAX_VALUE {
            return Err(HashIndexError::ValueOutOfRange(entry.refcount));
        }
        self.table.insert(*key, entry);
        Ok(())
    }

    #[inline]
    pub fn get(&self, key: &Key) -> Option<ChunkEntry> {
        self.table.get(key).copied()
    }

    #[inline]
    pub fn contains(&self, key: &Key) -> bool {
        self.table.contains(key)
    }

    /// Removes `key` and returns its entry.
    pub fn remove(&mut self, key: &Key) -> Result<ChunkEntry> {
        self.table.remove(key).ok_or(HashIndexError::KeyNotFound)
    }

    /// Folds `refs` more references into `key`, saturating the count;
    /// the sizes are overwritten with the caller's values. Absent keys
    /// are inserted.
    pub fn add(&mut self, key: &Key, refs: u32, size: u32, csize: u32) {
        if let Some(entry) = self.table.get_mut(key) {
            entry.refcount = saturate(entry.refcount as u64 + refs as u64);
            entry.size = size;
            entry.csize = csize;
            return;
        }
        self.table.insert(
            *key,
            ChunkEntry {
                refcount: saturate(refs as u64),
                size,
                csize,
            },
        );
    }

    /// Adds one reference to an existing chunk and returns the updated
    /// entry. A saturated count stays saturated.
    pub fn incref(&mut self, key: &Key) -> Result<ChunkEntry> {
        let entry = self
            .table
            .get_mut(key)
            .ok_or(HashIndexError::KeyNotFound)?;
        entry.refcount = saturate(entry.refcount as u64 + 1);
        Ok(*entry)
    }

    /// Drops one reference from an existing chunk and returns the
    /// updated entry. A saturated count stays saturated; decrementing a
    /// zero count is a caller bug and reported as such.
    pub fn decref(&mut self, key: &Key) -> Result<ChunkEntry> {
        let entry = self
            .table
            .get_mut(key)
            .ok_or(HashIndexError::KeyNotFound)?;
        if entry.refcount == 0 {
            return Err(HashIndexError::ZeroRefcount);
        }
        if entry.refcount != MAX_VALUE {
            entry.refcount -= 1;
        }
        Ok(*entry)
    }

    /// Folds `other` into `self`: refcounts are added with saturation,
    /// while for keys present on both sides the receiver keeps its own
    /// sizes, since those were written by the local chunker at
    /// ingestion.
    pub fn merge(&mut self, other: &ChunkIndex) {
        for (key, entry) in other.iter() {
            if let Some(mine) = self.table.get_mut(key) {
                mine.refcount = saturate(mine.refcount as u64 + entry.refcount as u64);
                continue;
            }
            self.table.insert(*key, entry);
        }
    }

    /// Totals over the whole index. Saturated refcounts contribute
    /// `MAX_VALUE` as-is; callers are expected to understand saturation.
    pub fn summarize(&self) -> IndexSummary {
        let mut summary = IndexSummary::default();
        for (_, entry) in self.iter() {
            let refcount = entry.refcount as u64;
            summary.chunks += refcount;
            summary.size += refcount * entry.size as u64;
            summary.csize += refcount * entry.csize as u64;
            summary.unique_size += entry.size as u64;
            summary.unique_csize += entry.csize as u64;
        }
        summary.unique_chunks = self.table.len() as u64;
        summary
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    #[inline]
    pub fn num_buckets(&self) -> usize {
        self.table.num_buckets()
    }

    /// Exact size in bytes this index occupies when written out.
    #[inline]
    pub fn size(&self) -> usize {
        format::on_disk_size(self.table.num_buckets(), ChunkEntry::SIZE)
    }

    /// Drops every entry and returns to the minimum allocation.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Rewrites the table so occupied buckets fill the front and the
    /// array shrinks to exactly the entry count, ready for a minimal
    /// write-out.
    pub fn compact(&mut self) {
        self.table.compact();
    }

    pub fn iter(&self) -> ChunkIter<'_> {
        ChunkIter {
            inner: self.table.iter(),
        }
    }

    /// Iterates the entries stored after the bucket holding `marker`;
    /// the marker entry itself is excluded.
    pub fn iter_from(&self, marker: &Key) -> Result<ChunkIter<'_>> {
        let pos = self
            .table
            .lookup(marker)
            .ok_or(HashIndexError::KeyNotFound)?;
        Ok(ChunkIter {
            inner: self.table.iter_at(pos + 1),
        })
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::read_from(&mut BufReader::new(file))
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            table: format::read_table(reader)?,
        })
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        format::write_table(&self.table, writer)
    }
}

impl Default for ChunkIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over `(key, entry)` pairs in bucket order.
pub struct ChunkIter<'a> {
    inner: Iter<'a, ChunkEntry>,
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = (&'a Key, ChunkEntry);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, value)| (key, *value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> FusedIterator for ChunkIter<'a> {}
