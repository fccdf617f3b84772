pub(crate) mod accounts;
pub(crate) mod ai_output;
pub(crate) mod course_admin;
pub(crate) mod errors;
pub(crate) mod join_codes;
pub(crate) mod submission_review;

pub(crate) use errors::ServiceError;
