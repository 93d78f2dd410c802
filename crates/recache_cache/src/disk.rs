//! File-backed cache store.
//!
//! Layout under the cache root:
//!
//! ```text
//! entries/<aa>/<sha256(key)>   one record per key
//! tmp/                         in-progress writes, renamed into place
//! ```
//!
//! A record is a 4-byte big-endian metadata length, the JSON metadata, then
//! the raw body.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, instrument};

use crate::{CacheEntry, CacheError, CacheKey, CacheMetadata, CacheStore};

const LEN_PREFIX: usize = 4;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord {
    key: String,
    size: u64,
    integrity: String,
    #[serde(flatten)]
    metadata: CacheMetadata,
}

#[derive(Debug, Clone)]
pub struct DiskCacheStore {
    root: PathBuf,
}

impl DiskCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let digest = key.digest();
        self.root.join("entries").join(&digest[..2]).join(&digest)
    }

    fn tmp_path(&self) -> PathBuf {
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        self.root
            .join("tmp")
            .join(format!("tmp_{}_{nanos:08x}_{seq}", std::process::id()))
    }
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn get(&self, key: &CacheKey) -> Result<CacheEntry, CacheError> {
        let path = self.entry_path(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CacheError::NotFound),
            Err(e) => return Err(e.into()),
        };

        decode_record(key, Bytes::from(raw))
    }

    #[instrument(skip(self, key, body, metadata), fields(key = %key, size = body.len()))]
    async fn put(
        &self,
        key: &CacheKey,
        body: Bytes,
        metadata: CacheMetadata,
    ) -> Result<(), CacheError> {
        let record = encode_record(key, &body, metadata)?;
        let final_path = self.entry_path(key);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::create_dir_all(self.root.join("tmp")).await?;

        let tmp_path = self.tmp_path();
        let written = write_then_rename(&tmp_path, &final_path, &record).await;
        if written.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }
        written?;

        debug!(
            target: "recache::cache",
            path = %final_path.display(),
            "Cache entry written"
        );
        Ok(())
    }
}

async fn write_then_rename(tmp: &Path, target: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, target).await
}

fn integrity_of(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

fn encode_record(
    key: &CacheKey,
    body: &[u8],
    metadata: CacheMetadata,
) -> Result<BytesMut, CacheError> {
    let record = PersistedRecord {
        key: key.as_str().to_string(),
        size: body.len() as u64,
        integrity: integrity_of(body),
        metadata,
    };
    let meta = serde_json::to_vec(&record).map_err(CacheError::Encode)?;
    let meta_len = u32::try_from(meta.len())
        .map_err(|_| CacheError::Corrupt("metadata too large".to_string()))?;

    let mut out = BytesMut::with_capacity(LEN_PREFIX + meta.len() + body.len());
    out.put_u32(meta_len);
    out.put_slice(&meta);
    out.put_slice(body);
    Ok(out)
}

fn decode_record(key: &CacheKey, raw: Bytes) -> Result<CacheEntry, CacheError> {
    if raw.len() < LEN_PREFIX {
        return Err(CacheError::Corrupt("truncated length prefix".to_string()));
    }
    let meta_len = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    let body_start = LEN_PREFIX
        .checked_add(meta_len)
        .filter(|end| *end <= raw.len())
        .ok_or_else(|| CacheError::Corrupt("truncated metadata".to_string()))?;

    let record: PersistedRecord = serde_json::from_slice(&raw[LEN_PREFIX..body_start])
        .map_err(|e| CacheError::Corrupt(format!("invalid metadata: {e}")))?;

    if record.key != key.as_str() {
        // Digest collision: the file belongs to another key.
        debug!(
            target: "recache::cache",
            stored_key = %record.key,
            "Cache file belongs to a different key"
        );
        return Err(CacheError::NotFound);
    }

    let body = raw.slice(body_start..);
    if body.len() as u64 != record.size {
        return Err(CacheError::Corrupt(format!(
            "body size {} does not match recorded size {}",
            body.len(),
            record.size
        )));
    }
    if integrity_of(&body) != record.integrity {
        return Err(CacheError::Corrupt("body integrity mismatch".to_string()));
    }

    Ok(CacheEntry::new(body, record.metadata))
}
