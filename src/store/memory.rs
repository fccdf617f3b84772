use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::backend::{Blob, BlobBackend, ChildEntry, EntryKind, WriteCondition};
use super::error::StorageError;
use super::paths::BlobPath;

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
    etag: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    blobs: BTreeMap<String, StoredBlob>,
    next_version: u64,
}

/// Process-local backend for tests and development.
#[derive(Debug, Default)]
pub(crate) struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().blobs.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BlobBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, path: &BlobPath) -> Result<Option<Blob>, StorageError> {
        let state = self.lock();
        Ok(state.blobs.get(path.as_str()).map(|stored| Blob {
            bytes: stored.bytes.clone(),
            content_type: Some(stored.content_type.clone()),
            etag: Some(stored.etag.clone()),
        }))
    }

    async fn put(
        &self,
        path: &BlobPath,
        bytes: Vec<u8>,
        content_type: &str,
        condition: WriteCondition,
    ) -> Result<(), StorageError> {
        let mut state = self.lock();
        let current = state.blobs.get(path.as_str()).map(|stored| stored.etag.as_str());

        let allowed = match &condition {
            WriteCondition::Overwrite => true,
            WriteCondition::IfMatch(expected) => current == Some(expected.as_str()),
            WriteCondition::IfAbsent => current.is_none(),
        };
        if !allowed {
            return Err(StorageError::Conflict { path: path.to_string() });
        }

        state.next_version += 1;
        let etag = format!("\"v{}\"", state.next_version);
        state.blobs.insert(
            path.as_str().to_string(),
            StoredBlob { bytes, content_type: content_type.to_string(), etag },
        );
        Ok(())
    }

    async fn delete(&self, path: &BlobPath) -> Result<(), StorageError> {
        let mut state = self.lock();
        state.blobs.retain(|key, _| {
            let Ok(candidate) = BlobPath::parse(key.as_str()) else {
                return true;
            };
            !path.contains(&candidate)
        });
        Ok(())
    }

    async fn list_children(&self, folder: &BlobPath) -> Result<Vec<ChildEntry>, StorageError> {
        let state = self.lock();
        let prefix = format!("{}/", folder.as_str());

        let mut files = BTreeSet::new();
        let mut folders = BTreeSet::new();
        for key in state.blobs.keys().filter(|key| key.starts_with(&prefix)) {
            let rest = &key[prefix.len()..];
            match rest.split_once('/') {
                Some((child, _)) => {
                    folders.insert(child.to_string());
                }
                None => {
                    files.insert(rest.to_string());
                }
            }
        }

        let entries = folders
            .into_iter()
            .map(|name| ChildEntry { name, kind: EntryKind::Folder })
            .chain(files.into_iter().map(|name| ChildEntry { name, kind: EntryKind::File }))
            .collect();
        Ok(entries)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
