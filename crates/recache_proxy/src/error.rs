use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForwardError {
    /// The request URI does not name a backend we can reach.
    #[error("invalid proxy target: {0}")]
    InvalidTarget(String),

    #[error("cannot build upstream request: {0}")]
    Request(#[from] http::Error),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("cannot connect to backend {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake with backend failed: {0}")]
    Tls(#[source] std::io::Error),

    #[error("HTTP handshake with backend failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("backend request failed: {0}")]
    Http(#[source] hyper::Error),

    #[error("failed to read backend response body: {0}")]
    Body(#[source] hyper::Error),
}

impl ForwardError {
    /// True for connectivity failures talking to the backend, as opposed to
    /// problems with the request itself or local configuration.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ForwardError::Connect { .. }
                | ForwardError::Tls(_)
                | ForwardError::Handshake(_)
                | ForwardError::Http(_)
                | ForwardError::Body(_)
        )
    }
}
