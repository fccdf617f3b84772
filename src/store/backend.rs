use async_trait::async_trait;

use super::error::StorageError;
use super::paths::BlobPath;

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json";

/// Raw content fetched from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Blob {
    pub(crate) bytes: Vec<u8>,
    pub(crate) content_type: Option<String>,
    pub(crate) etag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteCondition {
    Overwrite,
    IfMatch(String),
    IfAbsent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChildEntry {
    pub(crate) name: String,
    pub(crate) kind: EntryKind,
}

impl ChildEntry {
    pub(crate) fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// Path-addressable blob storage underneath one application root.
#[async_trait]
pub(crate) trait BlobBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Not-found is `Ok(None)`.
    async fn get(&self, path: &BlobPath) -> Result<Option<Blob>, StorageError>;

    /// Replaces the whole blob. A failed precondition is `StorageError::Conflict`.
    async fn put(
        &self,
        path: &BlobPath,
        bytes: Vec<u8>,
        content_type: &str,
        condition: WriteCondition,
    ) -> Result<(), StorageError>;

    /// Removes a blob or a folder with everything under it. Not-found is success.
    async fn delete(&self, path: &BlobPath) -> Result<(), StorageError>;

    /// Immediate children of a folder. An absent folder has no children.
    async fn list_children(&self, folder: &BlobPath) -> Result<Vec<ChildEntry>, StorageError>;

    /// Cheap reachability check, including credentials.
    async fn ping(&self) -> Result<(), StorageError>;
}
