use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::user::{RoleUpdate, UserResponse};
use crate::services::accounts;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/me", get(me)).route("/me/role", put(set_role))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

async fn set_role(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<RoleUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = accounts::assign_role(state.store(), &user.email, payload.role).await?;
    Ok(Json(UserResponse::from(&updated)))
}

#[cfg(test)]
mod tests;
