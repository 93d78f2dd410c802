use std::sync::{Arc, RwLock};

use http::{HeaderMap, Method, Request, Uri};
use tracing::error;

use crate::ProxyError;

/// What the error hook gets to see about the request that failed.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestInfo {
    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
        }
    }
}

/// Hook invoked with every request that ends in a 500/502, before the
/// status is written. It cannot change the status.
pub trait ErrorObserver: Send + Sync {
    fn observe(&self, request: &RequestInfo, error: &ProxyError);
}

impl<F> ErrorObserver for F
where
    F: Fn(&RequestInfo, &ProxyError) + Send + Sync,
{
    fn observe(&self, request: &RequestInfo, error: &ProxyError) {
        self(request, error)
    }
}

/// Default hook: one `error` event per failed request on
/// `recache::worker`. When no `tracing` subscriber has been installed the
/// line is written to stderr instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrors;

impl ErrorObserver for LogErrors {
    fn observe(&self, request: &RequestInfo, error: &ProxyError) {
        if !tracing::dispatcher::has_been_set() {
            eprintln!("recache: {}", failure_line(request, error));
            return;
        }
        error!(
            target: "recache::worker",
            method = %request.method,
            uri = %request.uri,
            status = error.status().as_u16(),
            error = ?error,
            "Cannot proxy {} {}",
            request.method,
            request.uri
        );
    }
}

fn failure_line(request: &RequestInfo, error: &ProxyError) -> String {
    format!(
        "{} {} failed with {}: {}",
        request.method,
        request.uri,
        error.status().as_u16(),
        error
    )
}

/// Replaceable observer shared between the proxy handle and its workers.
#[derive(Clone)]
pub(crate) struct ObserverSlot(Arc<RwLock<Arc<dyn ErrorObserver>>>);

impl ObserverSlot {
    pub(crate) fn new(observer: Arc<dyn ErrorObserver>) -> Self {
        Self(Arc::new(RwLock::new(observer)))
    }

    pub(crate) fn get(&self) -> Arc<dyn ErrorObserver> {
        match self.0.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn set(&self, observer: Arc<dyn ErrorObserver>) {
        match self.0.write() {
            Ok(mut guard) => *guard = observer,
            Err(poisoned) => *poisoned.into_inner() = observer,
        }
    }
}

impl Default for ObserverSlot {
    fn default() -> Self {
        Self::new(Arc::new(LogErrors))
    }
}
