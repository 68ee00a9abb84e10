use thiserror::Error;

/// Errors raised inside the persistence backends.
///
/// None of these ever reach engine callers: the store adapter turns a failed
/// load into "absent" and a failed save into a logged warning.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around JSON serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wrapper around IO errors (directory creation, locking, rename).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored bytes were not valid UTF-8.
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Backend refused the write (used by in-memory stores).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
