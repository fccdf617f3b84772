use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::db::types::{QuestionType, SubmissionStatus, UserRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct UserProfile {
    pub(crate) email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) role: Option<UserRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) student_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Course {
    pub(crate) course_id: String,
    pub(crate) course_name: String,
    pub(crate) teacher_email: String,
    pub(crate) join_code: String,
    #[serde(default)]
    pub(crate) student_emails: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,
}

impl Course {
    pub(crate) fn has_student(&self, email: &str) -> bool {
        self.student_emails.iter().any(|member| member.eq_ignore_ascii_case(email.trim()))
    }

    pub(crate) fn is_taught_by(&self, email: &str) -> bool {
        self.teacher_email.eq_ignore_ascii_case(email.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Question {
    pub(crate) id: String,
    #[serde(rename = "type")]
    pub(crate) question_type: QuestionType,
    pub(crate) question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) options: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Homework {
    pub(crate) homework_id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) questions: Vec<Question>,
    /// Set on remedial variants generated for a single student.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) student_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) original_homework_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,
}

impl Homework {
    pub(crate) fn is_remedial(&self) -> bool {
        self.student_email.is_some()
    }

    pub(crate) fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|question| question.id == question_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Answer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) text: Option<String>,
    /// File names stored under the submission's attachment folder.
    #[serde(default)]
    pub(crate) attachments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct QuestionGrade {
    pub(crate) question_id: String,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    #[serde(default)]
    pub(crate) feedback: String,
}

/// Review state of a submission, tagged by `status` in the stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum Review {
    Submitted,
    AiGraded {
        #[serde(with = "time::serde::rfc3339")]
        ai_graded_at: OffsetDateTime,
        ai_detailed_grades: Vec<QuestionGrade>,
    },
    FeedbackReleased {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ai_detailed_grades: Option<Vec<QuestionGrade>>,
        teacher_feedback: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        final_score: Option<f64>,
        #[serde(with = "time::serde::rfc3339")]
        released_at: OffsetDateTime,
    },
}

impl Review {
    pub(crate) fn status(&self) -> SubmissionStatus {
        match self {
            Self::Submitted => SubmissionStatus::Submitted,
            Self::AiGraded { .. } => SubmissionStatus::AiGraded,
            Self::FeedbackReleased { .. } => SubmissionStatus::FeedbackReleased,
        }
    }

    pub(crate) fn ai_grades(&self) -> Option<&[QuestionGrade]> {
        match self {
            Self::Submitted => None,
            Self::AiGraded { ai_detailed_grades, .. } => Some(ai_detailed_grades),
            Self::FeedbackReleased { ai_detailed_grades, .. } => ai_detailed_grades.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Submission {
    pub(crate) submission_id: String,
    pub(crate) homework_id: String,
    pub(crate) student_email: String,
    #[serde(default)]
    pub(crate) answers: BTreeMap<String, Answer>,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) submitted_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) updated_at: OffsetDateTime,
    #[serde(flatten)]
    pub(crate) review: Review,
}

impl Submission {
    pub(crate) fn status(&self) -> SubmissionStatus {
        self.review.status()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Session {
    pub(crate) token: String,
    pub(crate) email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) expires_at: OffsetDateTime,
}

impl Session {
    pub(crate) fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct OneTimeCode {
    pub(crate) email: String,
    pub(crate) code: String,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) expires_at: OffsetDateTime,
    #[serde(default)]
    pub(crate) failed_attempts: u32,
}

impl OneTimeCode {
    pub(crate) fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}
