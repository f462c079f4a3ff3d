//! Bit-exact on-disk representation.
//!
//! ```text
//! offset size  field
//!  0     8     magic "BORG_IDX"
//!  8     4     num_entries (little-endian u32)
//! 12     4     num_buckets (little-endian u32)
//! 16     1     key size in bytes (32)
//! 17     1     value size in bytes (8 or 12)
//! 18     ...   num_buckets x (key || value)
//! ```
//!
//! The first value word of each bucket carries the occupancy sentinel;
//! everything is little-endian regardless of host. Readers accept any
//! bucket count, including zero and counts below the minimum allocation,
//! and never validate load factor.

use std::io::{self, Read, Write};

use crate::error::{HashIndexError, Result};
use crate::index::table::{Bucket, RawTable};
use crate::index::{IndexValue, KEY_SIZE};

cfg_if::cfg_if! {
    if #[cfg(feature = "mmap")] {
        pub mod mmap;
    }
}

/// File magic, fixed by the repository format.
pub const MAGIC: [u8; 8] = *b"BORG_IDX";

/// Bytes before the bucket array starts.
pub const HEADER_SIZE: usize = 18;

/// First value word of an empty bucket.
pub const SENTINEL_EMPTY: u32 = 0xffff_ffff;

/// First value word of a deleted bucket.
pub const SENTINEL_DELETED: u32 = 0xffff_fffe;

/// Largest storable first value word; everything above is a sentinel.
pub const MAX_VALUE: u32 = 0xffff_fffd;

/// Exact byte size of a written table.
#[inline]
pub fn on_disk_size(num_buckets: usize, value_size: usize) -> usize {
    HEADER_SIZE + num_buckets * (KEY_SIZE + value_size)
}

pub(crate) struct Header {
    pub num_entries: u32,
    pub num_buckets: u32,
    pub key_size: u8,
    pub value_size: u8,
}

impl Header {
    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&MAGIC);
        buf[8..12].copy_from_slice(&self.num_entries.to_le_bytes());
        buf[12..16].copy_from_slice(&self.num_buckets.to_le_bytes());
        buf[16] = self.key_size;
        buf[17] = self.value_size;
        buf
    }

    fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        if buf[0..8] != MAGIC {
            return Err(HashIndexError::Format("bad magic".into()));
        }
        Ok(Self {
            num_entries: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            num_buckets: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            key_size: buf[16],
            value_size: buf[17],
        })
    }
}

/// `read_exact` with truncation reported as a format error rather than
/// plain I/O; other stream failures pass through unchanged.
fn read_exact_or_format<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            HashIndexError::Format("unexpected end of index file".into())
        } else {
            HashIndexError::Io(err)
        }
    })
}

/// Decodes a table of `V`-valued buckets from `reader`.
///
/// The header's entry count is trusted verbatim; corruption detection
/// belongs to whatever integrity-checking stream wraps the reader.
pub(crate) fn read_table<V: IndexValue, R: Read>(reader: &mut R) -> Result<RawTable<V>> {
    let mut head = [0u8; HEADER_SIZE];
    read_exact_or_format(reader, &mut head)?;
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
    let width = KEY_SIZE + V::SIZE;
    let mut buckets = Vec::with_capacity(num_buckets);
    let mut buf = vec![0u8; width];
    for _ in 0..num_buckets {
        read_exact_or_format(reader, &mut buf)?;
        let word = u32::from_le_bytes([
            buf[KEY_SIZE],
            buf[KEY_SIZE + 1],
            buf[KEY_SIZE + 2],
            buf[KEY_SIZE + 3],
        ]);
        buckets.push(match word {
            SENTINEL_EMPTY => Bucket::Empty,
            SENTINEL_DELETED => Bucket::Tombstone,
            _ => {
                let mut key = [0u8; KEY_SIZE];
                key.copy_from_slice(&buf[..KEY_SIZE]);
                Bucket::Occupied {
                    key,
                    value: V::from_raw(&buf[KEY_SIZE..]),
                }
            }
        });
    }
    Ok(RawTable::from_parts(buckets, header.num_entries as usize))
}

/// Encodes `table` to `writer`, byte for byte.
///
/// Empty and deleted buckets are written with zero-filled keys and value
/// tails, so the output is fully determined by the table's contents.
pub(crate) fn write_table<V: IndexValue, W: Write>(
    table: &RawTable<V>,
    writer: &mut W,
) -> Result<()> {
    let header = Header {
        num_entries: table.len() as u32,
        num_buckets: table.num_buckets() as u32,
        key_size: KEY_SIZE as u8,
        value_size: V::SIZE as u8,
    };
    writer.write_all(&header.encode())?;

    let width = KEY_SIZE + V::SIZE;
    let mut buf = vec![0u8; width];
    for bucket in table.raw_buckets() {
        for byte in buf.iter_mut() {
            *byte = 0;
        }
        match bucket {
            Bucket::Empty => {
                buf[KEY_SIZE..KEY_SIZE + 4].copy_from_slice(&SENTINEL_EMPTY.to_le_bytes());
            }
            Bucket::Tombstone => {
                buf[KEY_SIZE..KEY_SIZE + 4].copy_from_slice(&SENTINEL_DELETED.to_le_bytes());
            }
            Bucket::Occupied { key, value } => {
                buf[..KEY_SIZE].copy_from_slice(key);
                value.write_raw(&mut buf[KEY_SIZE..]);
            }
        }
        writer.write_all(&buf)?;
    }
    Ok(())
}
