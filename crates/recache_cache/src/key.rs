use std::fmt;

use http::Request;
use sha2::{Digest, Sha256};

/// Identity of a cache entry: request method and request target.
///
/// Headers and body are not part of the key, so requests that only differ
/// there share one entry.
#[derive(Clone, Hash, Eq, PartialEq, Debug)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &str, url: &str) -> Self {
        Self(format!("{method} {url}"))
    }

    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self::new(req.method().as_str(), &req.uri().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex-encoded SHA-256 of the key, used as the on-disk file name.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
