use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_offset;
use crate::db::models::Course;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CourseCreate {
    #[validate(length(min = 1, max = 200, message = "course_name must be 1-200 characters"))]
    pub(crate) course_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct JoinCourseRequest {
    #[validate(length(min = 1, message = "join_code must not be empty"))]
    pub(crate) join_code: String,
}

/// Join code and roster are only shown to the course teacher.
#[derive(Debug, Serialize)]
pub(crate) struct CourseResponse {
    pub(crate) course_id: String,
    pub(crate) course_name: String,
    pub(crate) teacher_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) join_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) student_emails: Option<Vec<String>>,
    pub(crate) student_count: usize,
    pub(crate) created_at: String,
}

impl CourseResponse {
    pub(crate) fn for_viewer(course: Course, viewer_email: &str) -> Self {
        let is_teacher = course.is_taught_by(viewer_email);
        Self {
            student_count: course.student_emails.len(),
            join_code: is_teacher.then(|| course.join_code.clone()),
            student_emails: is_teacher.then(|| course.student_emails.clone()),
            created_at: format_offset(course.created_at),
            course_id: course.course_id,
            course_name: course.course_name,
            teacher_email: course.teacher_email,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JoinCourseResponse {
    pub(crate) course: CourseResponse,
    pub(crate) already_member: bool,
}
