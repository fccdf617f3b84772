use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::error::StorageError;

/// Lifetime assumed when the token endpoint does not advertise one.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub(crate) struct IssuedToken {
    pub(crate) access_token: String,
    pub(crate) expires_in: Duration,
}

#[async_trait]
pub(crate) trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<IssuedToken, StorageError>;
}

/// OAuth2 client-credential exchange against a token endpoint.
#[derive(Debug, Clone)]
pub(crate) struct ClientCredentials {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl ClientCredentials {
    pub(crate) fn new(
        client: Client,
        token_url: String,
        client_id: String,
        client_secret: String,
        scope: String,
    ) -> Self {
        Self { client, token_url, client_id, client_secret, scope }
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    async fn fetch(&self) -> Result<IssuedToken, StorageError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|err| StorageError::Auth(format!("token request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Auth(format!("token endpoint returned {status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| StorageError::Auth(format!("invalid token response: {err}")))?;

        if token.access_token.is_empty() {
            return Err(StorageError::Auth("token endpoint returned an empty token".to_string()));
        }

        Ok(IssuedToken {
            access_token: token.access_token,
            expires_in: token.expires_in.map(Duration::from_secs).unwrap_or(DEFAULT_TOKEN_LIFETIME),
        })
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Caches a bearer credential until shortly before it expires.
///
/// The cache moves through absent → valid → expired → refreshed. A failed fetch leaves it
/// absent, so every caller sees `StorageError::Auth` until a later fetch succeeds.
#[derive(Clone)]
pub(crate) struct CredentialCache {
    source: Arc<dyn TokenSource>,
    margin: Duration,
    current: Arc<Mutex<Option<CachedToken>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CredentialState {
    Absent,
    Valid,
    Expired,
}

impl CredentialState {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Valid => "valid",
            Self::Expired => "expired",
        }
    }
}

impl CredentialCache {
    pub(crate) fn new(source: Arc<dyn TokenSource>, margin: Duration) -> Self {
        Self { source, margin, current: Arc::new(Mutex::new(None)) }
    }

    pub(crate) async fn bearer(&self) -> Result<String, StorageError> {
        self.bearer_at(Instant::now()).await
    }

    pub(crate) async fn bearer_at(&self, now: Instant) -> Result<String, StorageError> {
        // Held across the fetch so concurrent callers share one refresh.
        let mut guard = self.current.lock().await;
        if let Some(cached) = guard.as_ref() {
            if now < cached.refresh_at {
                return Ok(cached.value.clone());
            }
            tracing::info!("Storage credential expired; refreshing");
        }

        *guard = None;
        let issued = self.source.fetch().await.map_err(|err| {
            tracing::error!(error = %err, "Failed to obtain storage credential");
            err
        })?;

        let lifetime = cache_lifetime(issued.expires_in, self.margin);
        tracing::info!(cached_for_seconds = lifetime.as_secs(), "Obtained storage credential");
        *guard = Some(CachedToken { value: issued.access_token.clone(), refresh_at: now + lifetime });
        Ok(issued.access_token)
    }

    /// Drops the cached token, e.g. after the backend rejected it.
    pub(crate) async fn invalidate(&self) {
        *self.current.lock().await = None;
    }

    pub(crate) async fn state(&self) -> CredentialState {
        self.state_at(Instant::now()).await
    }

    pub(crate) async fn state_at(&self, now: Instant) -> CredentialState {
        match self.current.lock().await.as_ref() {
            None => CredentialState::Absent,
            Some(cached) if now < cached.refresh_at => CredentialState::Valid,
            Some(_) => CredentialState::Expired,
        }
    }
}

fn cache_lifetime(expires_in: Duration, margin: Duration) -> Duration {
    if expires_in > margin {
        expires_in - margin
    } else {
        expires_in / 2
    }
}
