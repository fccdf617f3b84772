use crate::db::models::OneTimeCode;
use crate::store::aggregate::{self, Change};
use crate::store::{paths, CachePolicy, DocumentStore, StorageError};

pub(crate) async fn save(store: &DocumentStore, code: &OneTimeCode) -> Result<(), StorageError> {
    store.put_json(&paths::login_code(&code.email), code).await
}

pub(crate) async fn find(
    store: &DocumentStore,
    email: &str,
) -> Result<Option<OneTimeCode>, StorageError> {
    store.get_json(&paths::login_code(email), CachePolicy::Bypass).await
}

/// Counts one wrong guess against the stored code. Returns the new count, or `None` when no
/// code is stored.
pub(crate) async fn record_failed_attempt(
    store: &DocumentStore,
    email: &str,
) -> Result<Option<u32>, StorageError> {
    aggregate::update::<Option<OneTimeCode>, _, StorageError, _>(
        store,
        &paths::login_code(email),
        |stored| match stored {
            Some(code) => {
                code.failed_attempts += 1;
                Ok(Change::Write(Some(code.failed_attempts)))
            }
            None => Ok(Change::Keep(None)),
        },
    )
    .await
}

pub(crate) async fn remove(store: &DocumentStore, email: &str) -> Result<(), StorageError> {
    store.delete(&paths::login_code(email)).await
}
