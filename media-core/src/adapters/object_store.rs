//! In-memory object store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::ports::ObjectStore;
use crate::types::{ObjectEntry, ObjectMetadata};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    metadata: ObjectMetadata,
}

/// In-memory [`ObjectStore`] for the local backend and tests.
#[derive(Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<HashMap<String, HashMap<String, StoredObject>>>,
    offline: RwLock<bool>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate store unavailability: every call fails with a transient
    /// error until switched back.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    fn check_online(&self) -> Result<()> {
        if *self.offline.read() {
            return Err(Error::TransientNetwork(
                "object store unavailable".to_string(),
            ));
        }
        Ok(())
    }

    /// Store an object with explicit metadata, as tests and fixtures need
    /// control over etag and modification time.
    pub fn put_with_metadata(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        etag: impl Into<String>,
        content_type: Option<&str>,
        last_modified: DateTime<Utc>,
    ) {
        let metadata = ObjectMetadata {
            etag: etag.into(),
            size: bytes.len() as u64,
            content_type: content_type.map(str::to_string),
            last_modified,
        };
        self.buckets
            .write()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), StoredObject { bytes, metadata });
    }

    fn content_etag(bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        hex_prefix(&digest, 16)
    }
}

fn hex_prefix(digest: &[u8], len: usize) -> String {
    digest
        .iter()
        .take(len)
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.check_online()?;
        self.buckets
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.bytes.clone())
            .ok_or_else(|| Error::NotFound(format!("object {bucket}/{key}")))
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        self.check_online()?;
        self.buckets
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.metadata.clone())
            .ok_or_else(|| Error::NotFound(format!("object {bucket}/{key}")))
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        self.check_online()?;
        Ok(self
            .buckets
            .read()
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key)))
    }

    async fn list(&self, bucket: &str) -> Result<Vec<ObjectEntry>> {
        self.check_online()?;
        let mut entries: Vec<ObjectEntry> = self
            .buckets
            .read()
            .get(bucket)
            .map(|objects| {
                objects
                    .iter()
                    .map(|(key, object)| ObjectEntry {
                        key: key.clone(),
                        metadata: object.metadata.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()> {
        self.check_online()?;
        let etag = Self::content_etag(&bytes);
        self.put_with_metadata(bucket, key, bytes, etag, content_type, Utc::now());
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.check_online()?;
        if let Some(objects) = self.buckets.write().get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn presign_url(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String> {
        self.check_online()?;
        if !self.exists(bucket, key).await? {
            return Err(Error::NotFound(format!("object {bucket}/{key}")));
        }
        let expires_at = Utc::now() + chrono::Duration::from_std(expires_in).unwrap_or_else(|_| chrono::Duration::zero());
        Ok(format!(
            "memory://{bucket}/{key}?expires={}",
            expires_at.timestamp()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryObjectStore::new();
        store
            .put("media", "a.wav", b"bytes".to_vec(), Some("audio/wav"))
            .await
            .unwrap();

        assert_eq!(store.get("media", "a.wav").await.unwrap(), b"bytes");
        let metadata = store.head("media", "a.wav").await.unwrap();
        assert_eq!(metadata.size, 5);
        assert_eq!(metadata.content_type.as_deref(), Some("audio/wav"));
        assert!(store.exists("media", "a.wav").await.unwrap());
    }

    #[tokio::test]
    async fn identical_bytes_yield_identical_etags() {
        let store = MemoryObjectStore::new();
        store
            .put("media", "a.wav", b"same".to_vec(), None)
            .await
            .unwrap();
        store
            .put("media", "b.wav", b"same".to_vec(), None)
            .await
            .unwrap();
        let a = store.head("media", "a.wav").await.unwrap();
        let b = store.head("media", "b.wav").await.unwrap();
        assert_eq!(a.etag, b.etag);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.get("media", "nope.wav").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn offline_store_fails_transiently() {
        let store = MemoryObjectStore::new();
        store
            .put("media", "a.wav", b"x".to_vec(), None)
            .await
            .unwrap();
        store.set_offline(true);
        assert!(matches!(
            store.get("media", "a.wav").await,
            Err(Error::TransientNetwork(_))
        ));
        store.set_offline(false);
        assert!(store.get("media", "a.wav").await.is_ok());
    }

    #[tokio::test]
    async fn list_is_sorted_by_key() {
        let store = MemoryObjectStore::new();
        store.put("media", "b.mp3", vec![1], None).await.unwrap();
        store.put("media", "a.wav", vec![2], None).await.unwrap();
        let keys: Vec<String> = store
            .list("media")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["a.wav", "b.mp3"]);
    }
}
