/// Failures reported by a [`KeyValueStore`](crate::state::KeyValueStore).
///
/// A missing key is not an error: stores report it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The payload stored under `key` could not be decoded.
    #[error("entry {key:?} could not be decoded")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The backing store failed, e.g. on I/O.
    #[error("store backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps an arbitrary backend failure.
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StoreError::Backend(err.into())
    }
}

/// Errors surfaced by controllers and policies.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store failed to read or write a counter.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An access counter could not be encoded for writing.
    #[error("access counter could not be encoded")]
    Encode(#[source] serde_json::Error),
}
