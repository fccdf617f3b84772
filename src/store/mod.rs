//! Key-value document store over hierarchical blob storage.

pub(crate) mod aggregate;
pub(crate) mod backend;
pub(crate) mod cache;
pub(crate) mod credentials;
pub(crate) mod documents;
pub(crate) mod drive;
pub(crate) mod error;
pub(crate) mod memory;
pub(crate) mod paths;
pub(crate) mod s3;

use std::sync::Arc;
use std::time::Duration;

pub(crate) use cache::{CachePolicy, CacheTtls};
pub(crate) use documents::DocumentStore;
pub(crate) use error::StorageError;

use crate::core::config::{Settings, StoreBackendKind};
use backend::BlobBackend;
use credentials::{ClientCredentials, CredentialCache};

/// Handles built from configuration. `credentials` is only present for the drive backend.
pub(crate) struct StoreHandles {
    pub(crate) documents: DocumentStore,
    pub(crate) credentials: Option<CredentialCache>,
}

pub(crate) async fn from_settings(settings: &Settings) -> Result<StoreHandles, StorageError> {
    let store_settings = settings.store();
    let ttls = CacheTtls {
        short: Duration::from_secs(store_settings.cache_short_ttl_seconds),
        long: Duration::from_secs(store_settings.cache_long_ttl_seconds),
    };

    let (backend, credentials): (Arc<dyn BlobBackend>, Option<CredentialCache>) =
        match store_settings.backend {
            StoreBackendKind::Drive => {
                let drive = settings.drive();
                let client = drive::DriveBackend::http_client(store_settings.request_timeout())?;
                let source = ClientCredentials::new(
                    client.clone(),
                    drive.token_url.clone(),
                    drive.client_id.clone(),
                    drive.client_secret.clone(),
                    drive.scope.clone(),
                );
                let credentials = CredentialCache::new(
                    Arc::new(source),
                    Duration::from_secs(drive.token_refresh_margin_seconds),
                );
                let backend = drive::DriveBackend::new(
                    client,
                    drive.base_url.clone(),
                    store_settings.app_root.clone(),
                    credentials.clone(),
                );
                (Arc::new(backend), Some(credentials))
            }
            StoreBackendKind::S3 => (Arc::new(s3::S3Backend::from_settings(settings).await), None),
            StoreBackendKind::Memory => {
                tracing::warn!("Using in-memory document store; data is lost on restart");
                (Arc::new(memory::MemoryBackend::new()), None)
            }
        };

    tracing::info!(
        backend = backend.name(),
        app_root = %store_settings.app_root,
        "Document store configured"
    );

    let documents =
        DocumentStore::with_cache_limit(backend, ttls, store_settings.cache_max_bytes());
    Ok(StoreHandles { documents, credentials })
}
