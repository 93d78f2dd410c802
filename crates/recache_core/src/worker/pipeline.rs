//! Cache-aside request pipeline.
//!
//! ```text
//! Received -> Looked-Up -> Fresh-Hit ----------------------------> Responded
//!                       -> Miss / Stale -> Forwarding -> Stored -> Responded
//! ```
//!
//! Failures while forwarding or storing leave the normal route and end in a
//! 500/502 after the error observer has seen them.

use std::{sync::Arc, time::Duration};

use http::{Method, Request, Response};
use http_body_util::BodyExt;
use hyper::body::Body;
use recache_cache::{
    CacheEntry, CacheError, CacheKey, CacheMetadata, CacheStore, Freshness, unix_millis,
};
use recache_http::ProxyBody;
use recache_http::responses::{build_response, connect_not_implemented, status_only};
use recache_proxy::Forwarder;
use tracing::{debug, warn};

use crate::ProxyError;
use crate::observer::{ErrorObserver, ObserverSlot, RequestInfo};

/// Outcome of the cache lookup for one request.
#[derive(Debug)]
enum Lookup {
    FreshHit(CacheEntry),
    Stale,
    Miss,
}

/// Per-request orchestration shared by all connections of one proxy.
pub struct Coordinator {
    store: Arc<dyn CacheStore>,
    forwarder: Forwarder,
    ttl: Duration,
    observer: ObserverSlot,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn CacheStore>,
        forwarder: Forwarder,
        ttl: Duration,
        observer: Arc<dyn ErrorObserver>,
    ) -> Self {
        Self::with_observer_slot(store, forwarder, ttl, ObserverSlot::new(observer))
    }

    pub(crate) fn with_observer_slot(
        store: Arc<dyn CacheStore>,
        forwarder: Forwarder,
        ttl: Duration,
        observer: ObserverSlot,
    ) -> Self {
        Self {
            store,
            forwarder,
            ttl,
            observer,
        }
    }

    /// Serves one request. Never fails: errors become 500/502 responses.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<ProxyBody>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if req.method() == Method::CONNECT {
            warn!(
                target: "recache::worker",
                authority = %req.uri(),
                "Rejecting CONNECT request; tunneling is not supported"
            );
            return connect_not_implemented();
        }

        let info = RequestInfo::from_request(&req);
        match self.process(req).await {
            Ok(response) => response,
            Err(err) => {
                self.observer.get().observe(&info, &err);
                status_only(err.status())
            }
        }
    }

    async fn process<B>(&self, req: Request<B>) -> Result<Response<ProxyBody>, ProxyError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        debug!(
            target: "recache::worker",
            method = %req.method(),
            uri = %req.uri(),
            headers = ?req.headers(),
            "Incoming request"
        );

        let key = CacheKey::from_request(&req);
        match self.lookup(&key).await {
            Lookup::FreshHit(entry) => {
                debug!(target: "recache::worker", %key, "Sending cached response");
                return Ok(replay(entry));
            }
            Lookup::Stale => {
                debug!(target: "recache::worker", %key, "Cache entry expired");
            }
            Lookup::Miss => {
                debug!(target: "recache::worker", %key, "Cache miss");
            }
        }

        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| ProxyError::ClientBody(e.into()))?
            .to_bytes();

        let backend = self
            .forwarder
            .forward(parts.method, &parts.uri, parts.headers, body)
            .await?;

        debug!(
            target: "recache::worker",
            %key,
            status = %backend.status,
            headers = ?backend.headers,
            "Got backend response"
        );

        let metadata = CacheMetadata::new(backend.status, &backend.headers, unix_millis());
        self.store
            .put(&key, backend.body.clone(), metadata)
            .await
            .map_err(ProxyError::Store)?;

        Ok(build_response(backend.status, backend.headers, backend.body))
    }

    async fn lookup(&self, key: &CacheKey) -> Lookup {
        match self.store.get(key).await {
            Ok(entry) => {
                let freshness =
                    Freshness::evaluate(entry.metadata.created_at, self.ttl, unix_millis());
                if freshness.is_fresh() {
                    Lookup::FreshHit(entry)
                } else {
                    Lookup::Stale
                }
            }
            Err(CacheError::NotFound) => Lookup::Miss,
            Err(e) => {
                warn!(
                    target: "recache::cache",
                    %key,
                    error = %e,
                    "Cannot load cached entry"
                );
                Lookup::Miss
            }
        }
    }
}

fn replay(entry: CacheEntry) -> Response<ProxyBody> {
    let status = entry.metadata.status();
    let headers = entry.metadata.header_map();
    build_response(status, headers, entry.body)
}
