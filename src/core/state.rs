use std::sync::Arc;

use crate::core::config::Settings;
use crate::store::credentials::CredentialCache;
use crate::store::DocumentStore;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: DocumentStore,
    credentials: Option<CredentialCache>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        store: DocumentStore,
        credentials: Option<CredentialCache>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, store, credentials }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &DocumentStore {
        &self.inner.store
    }

    /// Present only when the backend authenticates with an access token.
    pub(crate) fn credentials(&self) -> Option<&CredentialCache> {
        self.inner.credentials.as_ref()
    }
}
