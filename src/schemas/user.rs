use serde::{Deserialize, Serialize};

use crate::core::time::format_offset;
use crate::db::models::UserProfile;
use crate::db::types::UserRole;

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) email: String,
    pub(crate) role: Option<UserRole>,
    pub(crate) name: Option<String>,
    pub(crate) class_name: Option<String>,
    pub(crate) student_id: Option<String>,
    pub(crate) created_at: String,
}

impl From<&UserProfile> for UserResponse {
    fn from(profile: &UserProfile) -> Self {
        Self {
            email: profile.email.clone(),
            role: profile.role,
            name: profile.name.clone(),
            class_name: profile.class_name.clone(),
            student_id: profile.student_id.clone(),
            created_at: format_offset(profile.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleUpdate {
    pub(crate) role: UserRole,
}
