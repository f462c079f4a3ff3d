//! Persistent open-addressed hash tables for a deduplicating backup
//! store: [`NSIndex`] locates chunks by content hash, [`ChunkIndex`]
//! tracks their reference counts and sizes. Both share one Robin Hood
//! engine and one little-endian on-disk format.

/// On-disk codec and format constants
pub mod format;
/// The two index facades and their shared engine
pub mod index;

/// Error types
pub mod error;

pub use error::{HashIndexError, Result};
pub use format::{MAX_VALUE, SENTINEL_DELETED, SENTINEL_EMPTY};
pub use index::{
    ChunkEntry, ChunkIndex, IndexSummary, IndexValue, Key, NsEntry, NSIndex, KEY_SIZE,
};

#[cfg(feature = "mmap")]
pub use format::mmap::{MappedChunkIndex, MappedIndex, MappedNSIndex};
