use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{config::Settings, state::AppState, time::now_utc};
use crate::db::models::UserProfile;
use crate::db::types::UserRole;
use crate::repositories;
use crate::store::memory::MemoryBackend;
use crate::store::{CacheTtls, DocumentStore};

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    _guard: OwnedMutexGuard<()>,
}

impl TestContext {
    pub(crate) fn store(&self) -> &DocumentStore {
        self.state.store()
    }
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("HOMEWORK_ENV", "test");
    std::env::remove_var("ENVIRONMENT");
    std::env::set_var("HOMEWORK_STRICT_CONFIG", "0");
    std::env::remove_var("API_V1_STR");
    std::env::set_var("STORE_BACKEND", "memory");
    std::env::set_var("STORE_APP_ROOT", "homework-test");
    std::env::remove_var("STORE_CACHE_SHORT_TTL_SECONDS");
    std::env::remove_var("STORE_CACHE_LONG_TTL_SECONDS");
    std::env::remove_var("STORE_CACHE_MAX_MB");
    std::env::remove_var("DRIVE_TOKEN_URL");
    std::env::remove_var("DRIVE_CLIENT_ID");
    std::env::remove_var("DRIVE_CLIENT_SECRET");
    std::env::remove_var("SESSION_TTL_HOURS");
    std::env::remove_var("LOGIN_CODE_TTL_MINUTES");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("S3_ENDPOINT");
    std::env::remove_var("S3_ACCESS_KEY");
    std::env::remove_var("S3_SECRET_KEY");
    std::env::set_var("AWS_EC2_METADATA_DISABLED", "true");
}

pub(crate) fn memory_store() -> DocumentStore {
    DocumentStore::new(
        Arc::new(MemoryBackend::new()),
        CacheTtls { short: Duration::from_secs(15), long: Duration::from_secs(300) },
    )
}

pub(crate) fn profile(email: &str, role: Option<UserRole>) -> UserProfile {
    UserProfile {
        email: email.to_string(),
        created_at: now_utc(),
        role,
        name: None,
        class_name: None,
        student_id: None,
    }
}

pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let state = AppState::new(settings, memory_store(), None);
    let app = api::router::router(state.clone());

    TestContext { state, app, _guard: guard }
}

/// Creates a profile with the given role and returns a session token for it.
pub(crate) async fn sign_in(ctx: &TestContext, email: &str, role: Option<UserRole>) -> String {
    let now = now_utc();
    let mut user = repositories::users::ensure_profile(ctx.store(), email, now)
        .await
        .expect("ensure profile");
    user.role = role;
    repositories::users::save(ctx.store(), &user).await.expect("save profile");

    let session =
        repositories::sessions::issue(ctx.store(), &user.email, time::Duration::hours(1), now)
            .await
            .expect("issue session");
    session.token
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
