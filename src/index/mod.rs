pub mod chunk;
pub mod ns;

pub(crate) mod table;

/// 32-byte content hash addressing a chunk.
///
/// Keys are opaque to the engine; only the first four bytes are consumed
/// (little-endian) to pick the ideal bucket. Callers avoid the all-zero
/// key by convention, but nothing here depends on that.
pub type Key = [u8; 32];

/// Width of a key in bytes.
pub const KEY_SIZE: usize = 32;

/// Fixed-width bucket value stored inline next to its key.
///
/// The first 32-bit word of the encoded form doubles as the occupancy
/// word on disk, so stored values must keep it at or below
/// [`MAX_VALUE`](crate::format::MAX_VALUE); the typed facades enforce
/// this before anything reaches the bucket array.
pub trait IndexValue: Copy {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// The first 32-bit word (segment number or refcount).
    fn leading_word(&self) -> u32;

    /// Encode into `buf` (exactly `SIZE` bytes), little-endian.
    fn write_raw(&self, buf: &mut [u8]);

    /// Decode from `buf` (exactly `SIZE` bytes), little-endian.
    fn from_raw(buf: &[u8]) -> Self;
}

pub use self::chunk::{ChunkEntry, ChunkIndex, IndexSummary};
pub use self::ns::{NsEntry, NSIndex};
