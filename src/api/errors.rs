use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::ServiceError;
use crate::store::StorageError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    UnprocessableEntity(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidPath { path, reason } => {
                Self::BadRequest(format!("Invalid name {path:?}: {reason}"))
            }
            StorageError::Conflict { path } => {
                tracing::info!(path = %path, "Concurrent update gave up");
                Self::Conflict("Document changed concurrently, retry the request".to_string())
            }
            StorageError::Malformed { .. } => ApiError::internal(err, "Stored document is unreadable"),
            StorageError::Transport(_) | StorageError::Auth(_) | StorageError::Backend { .. } => {
                tracing::error!(error = %err, code = err.code(), "Document store unavailable");
                Self::ServiceUnavailable("Document store is unavailable".to_string())
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(err) => err.into(),
            ServiceError::MalformedOutput(err) => Self::UnprocessableEntity(err.to_string()),
            ServiceError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            ServiceError::Forbidden(message) => Self::Forbidden(message),
            ServiceError::InvalidInput(message) => Self::BadRequest(message),
            ServiceError::Conflict(message) => Self::Conflict(message),
            ServiceError::InvalidLoginCode => Self::Unauthorized("Invalid or expired login code"),
            ServiceError::Unauthenticated => {
                Self::Unauthorized("Invalid authentication credentials")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let status = StatusCode::UNAUTHORIZED;
                let mut response = (
                    status,
                    Json(ErrorResponse { status: status.as_u16(), detail: message.to_string() }),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::Forbidden(message) => {
                let status = StatusCode::FORBIDDEN;
                (
                    status,
                    Json(ErrorResponse { status: status.as_u16(), detail: message.to_string() }),
                )
                    .into_response()
            }
            ApiError::BadRequest(message) => {
                let status = StatusCode::BAD_REQUEST;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::NotFound(message) => {
                let status = StatusCode::NOT_FOUND;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::Conflict(message) => {
                let status = StatusCode::CONFLICT;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::UnprocessableEntity(message) => {
                let status = StatusCode::UNPROCESSABLE_ENTITY;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::ServiceUnavailable(message) => {
                let status = StatusCode::SERVICE_UNAVAILABLE;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
        }
    }
}
