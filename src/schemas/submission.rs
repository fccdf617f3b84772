use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_offset;
use crate::db::models::{Answer, QuestionGrade, Review, Submission};
use crate::db::types::SubmissionStatus;

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionUpsert {
    pub(crate) answers: BTreeMap<String, Answer>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ReleaseRequest {
    #[validate(email(message = "student_email must be a valid address"))]
    pub(crate) student_email: String,
    #[validate(length(min = 1, message = "teacher_feedback must not be empty"))]
    pub(crate) teacher_feedback: String,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "final_score must be non-negative"))]
    pub(crate) final_score: Option<f64>,
}

/// Either parsed grades or the model's raw reply; exactly one must be present.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AiGradesRequest {
    #[validate(email(message = "student_email must be a valid address"))]
    pub(crate) student_email: String,
    #[serde(default)]
    pub(crate) grades: Option<Vec<QuestionGrade>>,
    #[serde(default)]
    pub(crate) raw_output: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttachmentQuery {
    #[serde(default)]
    pub(crate) student_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttachmentResponse {
    pub(crate) homework_id: String,
    pub(crate) filename: String,
    pub(crate) size: usize,
    pub(crate) content_type: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) submission_id: String,
    pub(crate) homework_id: String,
    pub(crate) student_email: String,
    pub(crate) answers: BTreeMap<String, Answer>,
    pub(crate) status: SubmissionStatus,
    pub(crate) submitted_at: String,
    pub(crate) updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) ai_graded_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) ai_detailed_grades: Option<Vec<QuestionGrade>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) teacher_feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) final_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) released_at: Option<String>,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        let status = submission.status();
        let mut response = Self {
            submission_id: submission.submission_id,
            homework_id: submission.homework_id,
            student_email: submission.student_email,
            answers: submission.answers,
            status,
            submitted_at: format_offset(submission.submitted_at),
            updated_at: format_offset(submission.updated_at),
            ai_graded_at: None,
            ai_detailed_grades: None,
            teacher_feedback: None,
            final_score: None,
            released_at: None,
        };
        match submission.review {
            Review::Submitted => {}
            Review::AiGraded { ai_graded_at, ai_detailed_grades } => {
                response.ai_graded_at = Some(format_offset(ai_graded_at));
                response.ai_detailed_grades = Some(ai_detailed_grades);
            }
            Review::FeedbackReleased {
                ai_detailed_grades,
                teacher_feedback,
                final_score,
                released_at,
            } => {
                response.ai_detailed_grades = ai_detailed_grades;
                response.teacher_feedback = Some(teacher_feedback);
                response.final_score = final_score;
                response.released_at = Some(format_offset(released_at));
            }
        }
        response
    }
}
