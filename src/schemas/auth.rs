use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::schemas::user::UserResponse;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct LoginCodeRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginCodeResponse {
    pub(crate) email: String,
    pub(crate) expires_at: String,
    /// Only echoed outside production, where no delivery channel exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SessionCreate {
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    #[validate(length(equal = 6, message = "code must have 6 digits"))]
    pub(crate) code: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) token: String,
    pub(crate) token_type: String,
    pub(crate) expires_at: String,
    pub(crate) user: UserResponse,
}
