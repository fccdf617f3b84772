use time::OffsetDateTime;

use crate::db::models::UserProfile;
use crate::store::{paths, CachePolicy, DocumentStore, StorageError};

pub(crate) async fn find_by_email(
    store: &DocumentStore,
    email: &str,
) -> Result<Option<UserProfile>, StorageError> {
    store.get_json(&paths::user_profile(email), CachePolicy::Short).await
}

pub(crate) async fn save(store: &DocumentStore, profile: &UserProfile) -> Result<(), StorageError> {
    store.put_json(&paths::user_profile(&profile.email), profile).await
}

/// Returns the stored profile, creating a bare one on first login.
pub(crate) async fn ensure_profile(
    store: &DocumentStore,
    email: &str,
    now: OffsetDateTime,
) -> Result<UserProfile, StorageError> {
    let path = paths::user_profile(email);
    if let Some(profile) = store.get_json::<UserProfile>(&path, CachePolicy::Bypass).await? {
        return Ok(profile);
    }

    let profile = UserProfile {
        email: email.trim().to_lowercase(),
        created_at: now,
        role: None,
        name: None,
        class_name: None,
        student_id: None,
    };
    store.put_json(&path, &profile).await?;
    tracing::info!(email = %profile.email, "Created user profile");
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::UserRole;
    use crate::test_support::memory_store;
    use time::macros::datetime;

    #[tokio::test]
    async fn ensure_profile_creates_once() {
        let store = memory_store();
        let now = datetime!(2025-02-01 9:00 UTC);

        let created = ensure_profile(&store, " Teacher@Example.com", now).await.unwrap();
        assert_eq!(created.email, "teacher@example.com");
        assert!(created.role.is_none());

        let mut updated = created.clone();
        updated.role = Some(UserRole::Teacher);
        save(&store, &updated).await.unwrap();

        let again = ensure_profile(&store, "teacher@example.com", datetime!(2025-03-01 9:00 UTC))
            .await
            .unwrap();
        assert_eq!(again.role, Some(UserRole::Teacher));
        assert_eq!(again.created_at, now);
    }

    #[tokio::test]
    async fn unknown_email_is_absent() {
        let store = memory_store();
        assert!(find_by_email(&store, "nobody@example.com").await.unwrap().is_none());
    }
}
