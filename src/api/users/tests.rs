use crate::test_support;
use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn role_is_chosen_once() {
    let ctx = test_support::setup_test_context().await;
    let token = test_support::sign_in(&ctx, "new@example.com", None).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/users/me", Some(&token), None))
        .await
        .expect("me");
    let me = test_support::read_json(response).await;
    assert_eq!(me["email"], "new@example.com");
    assert!(me["role"].is_null());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            "/api/v1/users/me/role",
            Some(&token),
            Some(json!({"role": "teacher"})),
        ))
        .await
        .expect("set role");
    let status = response.status();
    let updated = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {updated}");
    assert_eq!(updated["role"], "teacher");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            "/api/v1/users/me/role",
            Some(&token),
            Some(json!({"role": "student"})),
        ))
        .await
        .expect("set role again");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn missing_or_unknown_token_is_unauthorized() {
    let ctx = test_support::setup_test_context().await;

    for token in [None, Some("0".repeat(64))] {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/v1/users/me",
                token.as_deref(),
                None,
            ))
            .await
            .expect("me");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["www-authenticate"], "Bearer");
    }
}
