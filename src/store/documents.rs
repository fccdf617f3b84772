use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::backend::{Blob, BlobBackend, ChildEntry, WriteCondition, JSON_CONTENT_TYPE};
use super::cache::{CachePolicy, CacheTtls, ReadCache, DEFAULT_CACHE_MAX_BYTES};
use super::error::StorageError;
use super::paths::BlobPath;
use crate::core::metrics;

/// A decoded document together with the version tag it was read at.
#[derive(Debug, Clone)]
pub(crate) struct Versioned<T> {
    pub(crate) value: T,
    pub(crate) etag: Option<String>,
}

/// JSON and binary documents over a blob backend, with a per-call TTL read cache.
#[derive(Clone)]
pub(crate) struct DocumentStore {
    backend: Arc<dyn BlobBackend>,
    cache: Arc<ReadCache>,
}

impl DocumentStore {
    pub(crate) fn new(backend: Arc<dyn BlobBackend>, ttls: CacheTtls) -> Self {
        Self::with_cache_limit(backend, ttls, DEFAULT_CACHE_MAX_BYTES)
    }

    pub(crate) fn with_cache_limit(
        backend: Arc<dyn BlobBackend>,
        ttls: CacheTtls,
        max_bytes: usize,
    ) -> Self {
        Self { backend, cache: Arc::new(ReadCache::new(ttls, max_bytes)) }
    }

    pub(crate) fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub(crate) async fn ping(&self) -> Result<(), StorageError> {
        let started = Instant::now();
        let result = self.backend.ping().await;
        self.observe("ping", &result, started);
        result
    }

    /// Content with the type it was stored under.
    pub(crate) async fn get_blob(
        &self,
        path: &BlobPath,
        policy: CachePolicy,
    ) -> Result<Option<Blob>, StorageError> {
        let started = Instant::now();
        if let Some(cached) = self.cache.content(path, policy, started) {
            metrics::record_cache_lookup(true);
            return Ok(cached);
        }
        if policy != CachePolicy::Bypass {
            metrics::record_cache_lookup(false);
        }

        let ticket = self.cache.begin_read();
        let result = self.backend.get(path).await;
        self.observe("get", &result, started);
        let blob = result?.map(|blob| Blob { etag: None, ..blob });

        tracing::debug!(path = %path, found = blob.is_some(), "Fetched document");
        self.cache.store_content(ticket, path, policy, blob.clone(), Instant::now());
        Ok(blob)
    }

    pub(crate) async fn get_bytes(
        &self,
        path: &BlobPath,
        policy: CachePolicy,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.get_blob(path, policy).await?.map(|blob| blob.bytes))
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &BlobPath,
        policy: CachePolicy,
    ) -> Result<Option<T>, StorageError> {
        match self.get_bytes(path, policy).await? {
            Some(bytes) => decode(path, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Always reads through to the backend and keeps the version tag for a conditional write.
    pub(crate) async fn get_json_versioned<T: DeserializeOwned>(
        &self,
        path: &BlobPath,
    ) -> Result<Option<Versioned<T>>, StorageError> {
        let started = Instant::now();
        let result = self.backend.get(path).await;
        self.observe("get", &result, started);

        let Some(blob) = result? else {
            return Ok(None);
        };
        let value = decode(path, &blob.bytes)?;
        Ok(Some(Versioned { value, etag: blob.etag }))
    }

    pub(crate) async fn put_bytes(
        &self,
        path: &BlobPath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.write(path, bytes, content_type, WriteCondition::Overwrite).await
    }

    /// Unconditional, complete replacement of the document.
    pub(crate) async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &BlobPath,
        value: &T,
    ) -> Result<(), StorageError> {
        let bytes = encode(path, value)?;
        self.write(path, bytes, JSON_CONTENT_TYPE, WriteCondition::Overwrite).await
    }

    /// Writes only if the stored version still matches `expected_etag`;
    /// `None` means the document must not exist yet.
    pub(crate) async fn put_json_if_match<T: Serialize + ?Sized>(
        &self,
        path: &BlobPath,
        value: &T,
        expected_etag: Option<&str>,
    ) -> Result<(), StorageError> {
        let bytes = encode(path, value)?;
        let condition = match expected_etag {
            Some(etag) => WriteCondition::IfMatch(etag.to_string()),
            None => WriteCondition::IfAbsent,
        };
        self.write(path, bytes, JSON_CONTENT_TYPE, condition).await
    }

    pub(crate) async fn delete(&self, path: &BlobPath) -> Result<(), StorageError> {
        let started = Instant::now();
        let result = self.backend.delete(path).await;
        self.observe("delete", &result, started);
        self.cache.invalidate_tree(path);
        result?;
        tracing::debug!(path = %path, "Deleted document tree");
        Ok(())
    }

    pub(crate) async fn list_children(
        &self,
        folder: &BlobPath,
        policy: CachePolicy,
    ) -> Result<Vec<ChildEntry>, StorageError> {
        let started = Instant::now();
        if let Some(cached) = self.cache.listing(folder, policy, started) {
            metrics::record_cache_lookup(true);
            return Ok(cached);
        }
        if policy != CachePolicy::Bypass {
            metrics::record_cache_lookup(false);
        }

        let ticket = self.cache.begin_read();
        let result = self.backend.list_children(folder).await;
        self.observe("list_children", &result, started);
        let entries = result?;

        tracing::debug!(folder = %folder, count = entries.len(), "Listed folder");
        self.cache.store_listing(ticket, folder, policy, entries.clone(), Instant::now());
        Ok(entries)
    }

    async fn write(
        &self,
        path: &BlobPath,
        bytes: Vec<u8>,
        content_type: &str,
        condition: WriteCondition,
    ) -> Result<(), StorageError> {
        let size = bytes.len();
        let started = Instant::now();
        let result = self.backend.put(path, bytes, content_type, condition).await;
        self.observe("put", &result, started);
        // A failed write may still have reached the backend; never trust the cached copy.
        self.cache.invalidate_write(path);
        result?;
        tracing::debug!(path = %path, bytes = size, content_type, "Stored document");
        Ok(())
    }

    fn observe<T>(&self, operation: &'static str, result: &Result<T, StorageError>, started: Instant) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(err) => {
                if !err.is_conflict() {
                    tracing::warn!(
                        backend = self.backend.name(),
                        operation,
                        error = %err,
                        "Storage operation failed"
                    );
                }
                err.code()
            }
        };
        metrics::record_store_operation(self.backend.name(), operation, outcome, started.elapsed());
    }
}

fn encode<T: Serialize + ?Sized>(path: &BlobPath, value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec_pretty(value).map_err(|err| StorageError::malformed(path.as_str(), err))
}

fn decode<T: DeserializeOwned>(path: &BlobPath, bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|err| StorageError::malformed(path.as_str(), err))
}
