//! Cache store for recorded backend responses.
//!
//! Entries are addressed by a [`CacheKey`] (`"<METHOD> <URL>"`) and hold the
//! response body plus its [`CacheMetadata`]. Freshness is never stored; it is
//! evaluated at read time by [`Freshness::evaluate`].

pub mod disk;
pub mod entry;
pub mod error;
pub mod key;
pub mod policy;
pub mod store;

pub use disk::DiskCacheStore;
pub use entry::{CacheEntry, CacheMetadata, StoredHeader};
pub use error::CacheError;
pub use key::CacheKey;
pub use policy::{Freshness, unix_millis};
pub use store::{CacheStore, MemoryCacheStore};
