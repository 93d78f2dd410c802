use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Response metadata persisted next to the body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub status_code: u16,
    /// Header fields in wire order; repeated names appear once per value.
    pub headers: Vec<StoredHeader>,
    /// Unix time in milliseconds when the backend response was recorded.
    pub created_at: u64,
}

/// One recorded header field. The value keeps its exact wire bytes (stored
/// hex-encoded), since header values are not required to be UTF-8.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHeader {
    pub name: String,
    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
}

impl StoredHeader {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl CacheMetadata {
    pub fn new(status: StatusCode, headers: &HeaderMap, created_at: u64) -> Self {
        let headers = headers
            .iter()
            .map(|(name, value)| StoredHeader::new(name.as_str(), value.as_bytes()))
            .collect();

        Self {
            status_code: status.as_u16(),
            headers,
            created_at,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Rebuilds a `HeaderMap`, skipping fields that are no longer valid.
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for StoredHeader { name, value } in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_bytes(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.append(name, value);
                }
                _ => {
                    warn!(
                        target: "recache::cache",
                        header = %name,
                        "Skipping invalid header in cached entry"
                    );
                }
            }
        }
        map
    }
}

/// A stored record: body bytes plus metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub body: Bytes,
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    pub fn new(body: Bytes, metadata: CacheMetadata) -> Self {
        Self { body, metadata }
    }
}
