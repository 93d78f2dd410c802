#![allow(dead_code)]

pub mod backend;
pub mod client;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use recache_core::{CachingProxy, DiskCacheStore, ProxyOptions};

pub use backend::{SLOW_DELAY, StubBackend};
pub use client::{RawResponse, send_raw, proxy_get};

/// Starts a disk-backed proxy on an ephemeral port.
pub async fn start_proxy(cache_dir: &Path, ttl: Duration) -> Result<CachingProxy> {
    let options = ProxyOptions::new(cache_dir).with_ttl(ttl);
    let mut proxy = CachingProxy::with_store(options, Arc::new(DiskCacheStore::new(cache_dir)));
    proxy.start().await?;
    Ok(proxy)
}

pub const ONE_DAY: Duration = Duration::from_secs(86_400);
