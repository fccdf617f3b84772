use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::BearerToken;
use crate::core::state::AppState;
use crate::core::time::{format_offset, now_utc};
use crate::schemas::auth::{LoginCodeRequest, LoginCodeResponse, SessionCreate, SessionResponse};
use crate::schemas::user::UserResponse;
use crate::services::accounts;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/login-code", post(request_login_code))
        .route("/session", post(create_session).delete(delete_session))
}

async fn request_login_code(
    State(state): State<AppState>,
    Json(payload): Json<LoginCodeRequest>,
) -> Result<(StatusCode, Json<LoginCodeResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let settings = state.settings();
    let issued = accounts::request_login_code(
        state.store(),
        &payload.email,
        settings.auth().login_code_ttl(),
        now_utc(),
    )
    .await?;

    let echo = settings.runtime().environment.echoes_login_codes();
    Ok((
        StatusCode::ACCEPTED,
        Json(LoginCodeResponse {
            email: issued.email,
            expires_at: format_offset(issued.expires_at),
            code: echo.then_some(issued.code),
        }),
    ))
}

async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<SessionCreate>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let (session, profile) = accounts::verify_login_code(
        state.store(),
        &payload.email,
        &payload.code,
        state.settings().auth().session_ttl(),
        now_utc(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token: session.token,
            token_type: "bearer".to_string(),
            expires_at: format_offset(session.expires_at),
            user: UserResponse::from(&profile),
        }),
    ))
}

async fn delete_session(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<StatusCode, ApiError> {
    accounts::sign_out(state.store(), &token).await?;
    Ok(StatusCode::NO_CONTENT)
}
