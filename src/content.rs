use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::storage::ObjectStorage;

/// Content-addressed blob store layered over object storage. Blobs live at
/// `content/{sha256}` and are never mutated; garbage collection of blobs
/// that no document references is deliberately deferred.
#[derive(Clone)]
pub struct ContentStore {
    storage: Arc<dyn ObjectStorage>,
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn blob_key(hash: &str) -> String {
    format!("content/{hash}")
}

impl ContentStore {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Idempotent write: hash first, skip the durable write when the blob
    /// already exists. Concurrent identical puts may both write; the bytes
    /// are identical so the outcome is observably the same.
    pub async fn put(&self, bytes: &[u8], content_type: Option<String>) -> Result<String> {
        let hash = hash_bytes(bytes);
        let key = blob_key(&hash);
        if self.storage.head_object(&key).await?.is_none() {
            self.storage
                .put_object(&key, bytes.to_vec(), content_type, None)
                .await?;
        }
        Ok(hash)
    }

    pub async fn get(&self, hash: &str) -> Result<Vec<u8>> {
        self.storage.get_object(&blob_key(hash)).await
    }

    pub async fn exists(&self, hash: &str) -> Result<bool> {
        Ok(self.storage.head_object(&blob_key(hash)).await?.is_some())
    }

    pub async fn presign_get(&self, hash: &str, expires_in: Duration) -> Result<String> {
        self.storage
            .presign_get_object(&blob_key(hash), expires_in)
            .await
    }
}
