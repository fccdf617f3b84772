//! Aggregate documents: one blob holding a JSON array of every record of a kind.
//!
//! `replace_all` is a plain last-write-wins overwrite. `update` is the read-modify-write used
//! by the repositories: it writes conditionally on the version it read and re-applies the
//! change when another writer got there first.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::cache::CachePolicy;
use super::documents::DocumentStore;
use super::error::StorageError;
use super::paths::BlobPath;

const MAX_UPDATE_ATTEMPTS: usize = 3;

pub(crate) async fn load_all<T: DeserializeOwned>(
    store: &DocumentStore,
    path: &BlobPath,
    policy: CachePolicy,
) -> Result<Vec<T>, StorageError> {
    Ok(store.get_json::<Vec<T>>(path, policy).await?.unwrap_or_default())
}

pub(crate) async fn replace_all<T: Serialize>(
    store: &DocumentStore,
    path: &BlobPath,
    items: &[T],
) -> Result<(), StorageError> {
    store.put_json(path, items).await
}

/// What an `update` closure decided to do with the document it was handed.
pub(crate) enum Change<R> {
    Write(R),
    Keep(R),
}

/// Applies `change` to the current document and writes it back if nobody else wrote in between.
///
/// `change` may run more than once and must not have side effects outside the document.
/// Absent documents start from `D::default()`.
pub(crate) async fn update<D, R, E, F>(
    store: &DocumentStore,
    path: &BlobPath,
    mut change: F,
) -> Result<R, E>
where
    D: Default + Serialize + DeserializeOwned,
    E: From<StorageError>,
    F: FnMut(&mut D) -> Result<Change<R>, E>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let current = store.get_json_versioned::<D>(path).await?;
        let (mut document, etag) = match current {
            Some(versioned) => (versioned.value, versioned.etag),
            None => (D::default(), None),
        };

        let outcome = match change(&mut document)? {
            Change::Write(outcome) => outcome,
            Change::Keep(outcome) => return Ok(outcome),
        };

        match store.put_json_if_match(path, &document, etag.as_deref()).await {
            Ok(()) => return Ok(outcome),
            Err(err) if err.is_conflict() && attempt < MAX_UPDATE_ATTEMPTS => {
                tracing::info!(path = %path, attempt, "Aggregate changed concurrently; retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
}
