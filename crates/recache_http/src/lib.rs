pub mod headers;
pub mod responses;

/// Body type used for every response the proxy writes: always fully buffered.
pub type ProxyBody = http_body_util::Full<bytes::Bytes>;
