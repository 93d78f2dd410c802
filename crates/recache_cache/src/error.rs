use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// No entry is stored under the key. Not a fault.
    #[error("no cache entry for key")]
    NotFound,

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt cache entry: {0}")]
    Corrupt(String),

    #[error("cannot encode cache metadata: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound)
    }
}
