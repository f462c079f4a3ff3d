use thiserror::Error;

/// Errors reported by the index tables and their on-disk codec.
///
/// I/O errors from the byte stream handed to `read_from`/`write_to` are
/// passed through unchanged, so failures raised by an integrity-checking
/// stream wrapper reach the caller intact.
#[derive(Error, Debug)]
pub enum HashIndexError {
    #[error("key not present in index")]
    KeyNotFound,
    #[error("value word `{0}` exceeds MAX_VALUE")]
    ValueOutOfRange(u32),
    #[error("refcount decrement on zero refcount")]
    ZeroRefcount,
    #[error("invalid index file: {0}")]
    Format(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HashIndexError>;
