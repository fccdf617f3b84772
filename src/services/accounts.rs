use rand::Rng;
use time::{Duration, OffsetDateTime};

use crate::db::models::{OneTimeCode, Session, UserProfile};
use crate::db::types::UserRole;
use crate::repositories;
use crate::services::ServiceError;
use crate::store::DocumentStore;

pub(crate) fn normalize_email(raw: &str) -> Result<String, ServiceError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(ServiceError::invalid("Invalid email address"))
    }
}

/// Wrong guesses allowed against one code before it is discarded.
pub(crate) const MAX_LOGIN_ATTEMPTS: u32 = 5;

fn generate_login_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32))
}

/// Stores a fresh code for the email, replacing any earlier one.
pub(crate) async fn request_login_code(
    store: &DocumentStore,
    email: &str,
    ttl: Duration,
    now: OffsetDateTime,
) -> Result<OneTimeCode, ServiceError> {
    let email = normalize_email(email)?;
    let code = OneTimeCode {
        email,
        code: generate_login_code(),
        expires_at: now + ttl,
        failed_attempts: 0,
    };
    repositories::login_codes::save(store, &code).await?;
    tracing::info!(email = %code.email, expires_at = %code.expires_at, "Issued login code");
    Ok(code)
}

/// Consumes a valid code and opens a session, creating the profile on first login.
pub(crate) async fn verify_login_code(
    store: &DocumentStore,
    email: &str,
    code: &str,
    session_ttl: Duration,
    now: OffsetDateTime,
) -> Result<(Session, UserProfile), ServiceError> {
    let email = normalize_email(email)?;
    let Some(stored) = repositories::login_codes::find(store, &email).await? else {
        return Err(ServiceError::InvalidLoginCode);
    };

    if !stored.is_valid_at(now) {
        repositories::login_codes::remove(store, &email).await?;
        tracing::info!(email = %email, "Rejected expired login code");
        return Err(ServiceError::InvalidLoginCode);
    }
    if stored.failed_attempts >= MAX_LOGIN_ATTEMPTS {
        repositories::login_codes::remove(store, &email).await?;
        return Err(ServiceError::InvalidLoginCode);
    }
    if stored.code != code.trim() {
        let failures = repositories::login_codes::record_failed_attempt(store, &email)
            .await?
            .unwrap_or(MAX_LOGIN_ATTEMPTS);
        if failures >= MAX_LOGIN_ATTEMPTS {
            repositories::login_codes::remove(store, &email).await?;
            tracing::warn!(email = %email, failures, "Discarded login code after repeated wrong guesses");
        } else {
            tracing::info!(email = %email, failures, "Rejected wrong login code");
        }
        return Err(ServiceError::InvalidLoginCode);
    }

    repositories::login_codes::remove(store, &email).await?;
    let profile = repositories::users::ensure_profile(store, &email, now).await?;
    let session = repositories::sessions::issue(store, &email, session_ttl, now).await?;
    Ok((session, profile))
}

pub(crate) async fn authenticate(
    store: &DocumentStore,
    token: &str,
    now: OffsetDateTime,
) -> Result<UserProfile, ServiceError> {
    let Some(session) = repositories::sessions::find_valid(store, token, now).await? else {
        return Err(ServiceError::Unauthenticated);
    };
    repositories::users::find_by_email(store, &session.email)
        .await?
        .ok_or(ServiceError::Unauthenticated)
}

pub(crate) async fn sign_out(store: &DocumentStore, token: &str) -> Result<(), ServiceError> {
    if repositories::sessions::revoke(store, token).await? {
        tracing::info!("Session revoked");
    }
    Ok(())
}

/// A role is chosen once; choosing again is a conflict even with the same value.
pub(crate) async fn assign_role(
    store: &DocumentStore,
    email: &str,
    role: UserRole,
) -> Result<UserProfile, ServiceError> {
    let Some(mut profile) = repositories::users::find_by_email(store, email).await? else {
        return Err(ServiceError::NotFound("User"));
    };
    if let Some(existing) = profile.role {
        return Err(ServiceError::Conflict(format!("Role is already set to {}", existing.as_str())));
    }

    profile.role = Some(role);
    repositories::users::save(store, &profile).await?;
    tracing::info!(email = %profile.email, role = role.as_str(), "Assigned user role");
    Ok(profile)
}

pub(crate) fn require_role(profile: &UserProfile, role: UserRole) -> Result<(), ServiceError> {
    match profile.role {
        Some(actual) if actual == role => Ok(()),
        Some(_) => Err(ServiceError::Forbidden(match role {
            UserRole::Teacher => "Teacher role required",
            UserRole::Student => "Student role required",
        })),
        None => Err(ServiceError::Forbidden("Choose a role first")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_store;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2025-02-01 9:00 UTC);

    #[test]
    fn emails_are_normalized_and_checked() {
        assert_eq!(normalize_email("  Ann@Example.COM ").unwrap(), "ann@example.com");
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("a@b").is_err());
        assert!(normalize_email("a b@example.com").is_err());
    }

    #[tokio::test]
    async fn login_code_opens_a_session_once() {
        let store = memory_store();
        let issued =
            request_login_code(&store, "Ann@example.com", Duration::minutes(10), NOW).await.unwrap();
        assert_eq!(issued.code.len(), 6);
        assert!(issued.code.chars().all(|ch| ch.is_ascii_digit()));

        let (session, profile) =
            verify_login_code(&store, "ann@example.com", &issued.code, Duration::hours(1), NOW)
                .await
                .unwrap();
        assert_eq!(profile.email, "ann@example.com");
        assert_eq!(authenticate(&store, &session.token, NOW).await.unwrap(), profile);

        let reused =
            verify_login_code(&store, "ann@example.com", &issued.code, Duration::hours(1), NOW).await;
        assert!(matches!(reused, Err(ServiceError::InvalidLoginCode)));
    }

    #[tokio::test]
    async fn wrong_and_expired_codes_are_rejected() {
        let store = memory_store();
        let issued =
            request_login_code(&store, "ann@example.com", Duration::minutes(10), NOW).await.unwrap();
        let wrong = if issued.code == "000000" { "111111" } else { "000000" };

        let attempt = verify_login_code(&store, "ann@example.com", wrong, Duration::hours(1), NOW).await;
        assert!(matches!(attempt, Err(ServiceError::InvalidLoginCode)));

        let late = NOW + Duration::minutes(11);
        let attempt =
            verify_login_code(&store, "ann@example.com", &issued.code, Duration::hours(1), late).await;
        assert!(matches!(attempt, Err(ServiceError::InvalidLoginCode)));
        assert!(repositories::login_codes::find(&store, "ann@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn code_is_discarded_after_repeated_wrong_guesses() {
        let store = memory_store();
        let issued =
            request_login_code(&store, "ann@example.com", Duration::minutes(10), NOW).await.unwrap();

        let mut rejected = 0;
        for guess in 0..MAX_LOGIN_ATTEMPTS {
            let wrong = format!("{:06}", (issued.code.parse::<u32>().unwrap() + guess + 1) % 1_000_000);
            let attempt =
                verify_login_code(&store, "ann@example.com", &wrong, Duration::hours(1), NOW).await;
            assert!(matches!(attempt, Err(ServiceError::InvalidLoginCode)));
            rejected += 1;
        }
        assert_eq!(rejected, MAX_LOGIN_ATTEMPTS);
        assert!(repositories::login_codes::find(&store, "ann@example.com").await.unwrap().is_none());

        let correct =
            verify_login_code(&store, "ann@example.com", &issued.code, Duration::hours(1), NOW).await;
        assert!(matches!(correct, Err(ServiceError::InvalidLoginCode)));
    }

    #[tokio::test]
    async fn a_few_wrong_guesses_still_allow_the_right_code() {
        let store = memory_store();
        let issued =
            request_login_code(&store, "ann@example.com", Duration::minutes(10), NOW).await.unwrap();
        let wrong = if issued.code == "000000" { "111111" } else { "000000" };

        for _ in 1..MAX_LOGIN_ATTEMPTS {
            let attempt = verify_login_code(&store, "ann@example.com", wrong, Duration::hours(1), NOW).await;
            assert!(matches!(attempt, Err(ServiceError::InvalidLoginCode)));
        }
        assert!(
            verify_login_code(&store, "ann@example.com", &issued.code, Duration::hours(1), NOW)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn role_can_only_be_chosen_once() {
        let store = memory_store();
        repositories::users::ensure_profile(&store, "t@example.com", NOW).await.unwrap();

        let profile = assign_role(&store, "t@example.com", UserRole::Teacher).await.unwrap();
        assert_eq!(profile.role, Some(UserRole::Teacher));
        assert!(require_role(&profile, UserRole::Teacher).is_ok());
        assert!(matches!(
            require_role(&profile, UserRole::Student),
            Err(ServiceError::Forbidden(_))
        ));

        let again = assign_role(&store, "t@example.com", UserRole::Student).await;
        assert!(matches!(again, Err(ServiceError::Conflict(_))));
        let missing = assign_role(&store, "ghost@example.com", UserRole::Student).await;
        assert!(matches!(missing, Err(ServiceError::NotFound("User"))));
    }

    #[tokio::test]
    async fn unknown_or_revoked_tokens_do_not_authenticate() {
        let store = memory_store();
        assert!(matches!(
            authenticate(&store, "deadbeef", NOW).await,
            Err(ServiceError::Unauthenticated)
        ));

        let issued =
            request_login_code(&store, "ann@example.com", Duration::minutes(10), NOW).await.unwrap();
        let (session, _) =
            verify_login_code(&store, "ann@example.com", &issued.code, Duration::hours(1), NOW)
                .await
                .unwrap();
        sign_out(&store, &session.token).await.unwrap();

        assert!(matches!(
            authenticate(&store, &session.token, NOW).await,
            Err(ServiceError::Unauthenticated)
        ));
    }
}
