//! Recording HTTP forward proxy.
//!
//! [`CachingProxy`] owns the listener lifecycle; every accepted connection is
//! served by the worker, which runs each request through the cache-aside
//! [`Coordinator`].

pub mod error;
pub mod master;
pub mod observer;
pub mod worker;

pub use error::{LifecycleError, ProxyError};
pub use master::CachingProxy;
pub use observer::{ErrorObserver, LogErrors, RequestInfo};
pub use worker::Coordinator;

pub use recache_cache::{CacheStore, DiskCacheStore, MemoryCacheStore};
pub use recache_config::ProxyOptions;
