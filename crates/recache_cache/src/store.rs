use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::{CacheEntry, CacheError, CacheKey, CacheMetadata};

/// Keyed persistence for recorded responses.
///
/// `get` must report an unknown key as [`CacheError::NotFound`] and nothing
/// else; `put` replaces any previous entry for the key as a whole.
#[async_trait]
pub trait CacheStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &CacheKey) -> Result<CacheEntry, CacheError>;

    async fn put(
        &self,
        key: &CacheKey,
        body: Bytes,
        metadata: CacheMetadata,
    ) -> Result<(), CacheError>;
}

/// Process-local store, handy for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<CacheEntry, CacheError> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or(CacheError::NotFound)
    }

    async fn put(
        &self,
        key: &CacheKey,
        body: Bytes,
        metadata: CacheMetadata,
    ) -> Result<(), CacheError> {
        self.entries
            .insert(key.clone(), CacheEntry::new(body, metadata));
        Ok(())
    }
}
