use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_offset;
use crate::db::models::{Homework, Question};
use crate::db::types::QuestionType;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub(crate) struct QuestionPayload {
    #[validate(length(min = 1, max = 64, message = "question id must be 1-64 characters"))]
    pub(crate) id: String,
    #[serde(rename = "type")]
    pub(crate) question_type: QuestionType,
    #[validate(length(min = 1, message = "question must not be empty"))]
    pub(crate) question: String,
    #[serde(default)]
    pub(crate) options: Option<Vec<String>>,
}

impl From<QuestionPayload> for Question {
    fn from(payload: QuestionPayload) -> Self {
        Self {
            id: payload.id,
            question_type: payload.question_type,
            question: payload.question,
            options: payload.options,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct HomeworkCreate {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: String,
    #[validate(length(min = 1, message = "at least one question is required"))]
    #[validate(nested)]
    pub(crate) questions: Vec<QuestionPayload>,
    #[serde(default)]
    #[validate(email(message = "student_email must be a valid address"))]
    pub(crate) student_email: Option<String>,
    #[serde(default)]
    pub(crate) original_homework_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HomeworkResponse {
    pub(crate) homework_id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
    pub(crate) questions: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) student_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) original_homework_id: Option<String>,
    pub(crate) created_at: String,
}

impl From<Homework> for HomeworkResponse {
    fn from(homework: Homework) -> Self {
        Self {
            created_at: format_offset(homework.created_at),
            homework_id: homework.homework_id,
            course_id: homework.course_id,
            title: homework.title,
            questions: homework.questions,
            student_email: homework.student_email,
            original_homework_id: homework.original_homework_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(questions: serde_json::Value) -> HomeworkCreate {
        serde_json::from_value(json!({"title": "Week 1", "questions": questions})).expect("payload")
    }

    #[test]
    fn homework_needs_at_least_one_valid_question() {
        assert!(payload(json!([])).validate().is_err());
        assert!(payload(json!([{"id": "", "type": "text", "question": "Why?"}])).validate().is_err());
        assert!(payload(json!([{"id": "q1", "type": "text", "question": "Why?"}])).validate().is_ok());
    }

    #[test]
    fn question_payload_serializes_with_its_wire_names() {
        let question = QuestionPayload {
            id: "q1".to_string(),
            question_type: QuestionType::MultipleChoice,
            question: "Pick".to_string(),
            options: Some(vec!["a".to_string(), "b".to_string()]),
        };
        let value = serde_json::to_value(&question).expect("serialize");
        assert_eq!(value["type"], "multiple_choice");
        assert_eq!(value["options"], json!(["a", "b"]));
    }
}
