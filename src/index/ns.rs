use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::iter::FusedIterator;
use std::path::Path;

use crate::error::{HashIndexError, Result};
use crate::format::{self, MAX_VALUE};
use crate::index::table::{Iter, RawTable};
use crate::index::{IndexValue, Key};

/// Location of a stored chunk: segment file number and byte offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NsEntry {
    pub segment: u32,
    pub offset: u32,
}

impl IndexValue for NsEntry {
    const SIZE: usize = 8;

    #[inline]
    fn leading_word(&self) -> u32 {
        self.segment
    }

    fn write_raw(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.segment.to_le_bytes());
        buf[4..8].copy_from_slice(&self.offset.to_le_bytes());
    }

    fn from_raw(buf: &[u8]) -> Self {
        Self {
            segment: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            offset: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }
}

/// Maps a content hash to the segment and offset where its chunk lives.
///
/// The segment number shares its word with the on-disk occupancy
/// sentinels, so it is capped at [`MAX_VALUE`]; inserting a larger one
/// fails without touching the table.
pub struct NSIndex {
    table: RawTable<NsEntry>,
}

impl NSIndex {
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

    /// Inserts or overwrites the location for `key`.
    pub fn insert(&mut self, key: &Key, entry: NsEntry) -> Result<()> {
        if entry.segment > MAX_VALUE {
            return Err(HashIndexError::ValueOutOfRange(entry.segment));
        }
        self.table.insert(*key, entry);
        Ok(())
    }

    #[inline]
    pub fn get(&self, key: &Key) -> Option<NsEntry> {
        self.table.get(key).copied()
    }

    #[inline]
    pub fn contains(&self, key: &Key) -> bool {
        self.table.contains(key)
    }

    /// Removes `key` and returns its location.
    pub fn remove(&mut self, key: &Key) -> Result<NsEntry> {
        self.table.remove(key).ok_or(HashIndexError::KeyNotFound)
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
        format::on_disk_size(self.table.num_buckets(), NsEntry::SIZE)
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

    pub fn iter(&self) -> NsIter<'_> {
        NsIter {
            inner: self.table.iter(),
        }
    }

    /// Iterates the entries stored after the bucket holding `marker`;
    /// the marker entry itself is excluded.
    pub fn iter_from(&self, marker: &Key) -> Result<NsIter<'_>> {
        let pos = self
            .table
            .lookup(marker)
            .ok_or(HashIndexError::KeyNotFound)?;
        Ok(NsIter {
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

impl Default for NSIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over `(key, entry)` pairs in bucket order.
pub struct NsIter<'a> {
    inner: Iter<'a, NsEntry>,
}

impl<'a> Iterator for NsIter<'a> {
    type Item = (&'a Key, NsEntry);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, value)| (key, *value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> FusedIterator for NsIter<'a> {}
