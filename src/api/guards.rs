use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{state::AppState, time::now_utc};
use crate::db::models::UserProfile;
use crate::db::types::UserRole;
use crate::services::accounts;

/// The raw session token from `Authorization: Bearer <token>`.
pub(crate) struct BearerToken(pub(crate) String);
pub(crate) struct CurrentUser(pub(crate) UserProfile);
pub(crate) struct CurrentTeacher(pub(crate) UserProfile);
pub(crate) struct CurrentStudent(pub(crate) UserProfile);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;
        Ok(BearerToken(token.to_string()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;

        let user = accounts::authenticate(app_state.store(), &token, now_utc()).await?;
        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentTeacher {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        accounts::require_role(&user, UserRole::Teacher)?;
        Ok(CurrentTeacher(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentStudent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        accounts::require_role(&user, UserRole::Student)?;
        Ok(CurrentStudent(user))
    }
}
