use std::error::Error as StdError;

use http::StatusCode;
use recache_cache::CacheError;
use recache_proxy::ForwardError;
use thiserror::Error;

/// Failure while serving one proxied request.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("cannot store cache entry: {0}")]
    Store(#[source] CacheError),

    #[error("cannot read client request body: {0}")]
    ClientBody(#[source] Box<dyn StdError + Send + Sync>),
}

impl ProxyError {
    /// Status written to the client: 502 for backend connectivity failures,
    /// 500 for everything else.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Forward(e) if e.is_network() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("proxy is already running on port {0}")]
    AlreadyRunning(u16),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Forwarder(#[from] ForwardError),
}
