//! Session tokens live in a single map document keyed by token.

use std::collections::BTreeMap;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::db::models::Session;
use crate::store::aggregate::{self, Change};
use crate::store::{paths, CachePolicy, DocumentStore, StorageError};

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionEntry {
    email: String,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
}

type SessionMap = BTreeMap<String, SessionEntry>;

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues a new token and drops expired ones in the same write.
pub(crate) async fn issue(
    store: &DocumentStore,
    email: &str,
    ttl: Duration,
    now: OffsetDateTime,
) -> Result<Session, StorageError> {
    let session = Session {
        token: generate_token(),
        email: email.to_string(),
        expires_at: now + ttl,
    };

    let pruned = aggregate::update(store, &paths::sessions(), |sessions: &mut SessionMap| {
        let before = sessions.len();
        sessions.retain(|_, entry| now < entry.expires_at);
        let pruned = before - sessions.len();
        sessions.insert(
            session.token.clone(),
            SessionEntry { email: session.email.clone(), expires_at: session.expires_at },
        );
        Ok::<_, StorageError>(Change::Write(pruned))
    })
    .await?;

    tracing::info!(email = %session.email, pruned, "Issued session");
    Ok(session)
}

pub(crate) async fn find_valid(
    store: &DocumentStore,
    token: &str,
    now: OffsetDateTime,
) -> Result<Option<Session>, StorageError> {
    let sessions: SessionMap =
        store.get_json(&paths::sessions(), CachePolicy::Short).await?.unwrap_or_default();
    Ok(sessions
        .get(token)
        .map(|entry| Session {
            token: token.to_string(),
            email: entry.email.clone(),
            expires_at: entry.expires_at,
        })
        .filter(|session| session.is_valid_at(now)))
}

/// Returns whether the token was known.
pub(crate) async fn revoke(store: &DocumentStore, token: &str) -> Result<bool, StorageError> {
    aggregate::update(store, &paths::sessions(), |sessions: &mut SessionMap| {
        if sessions.remove(token).is_some() {
            Ok::<_, StorageError>(Change::Write(true))
        } else {
            Ok(Change::Keep(false))
        }
    })
    .await
}
