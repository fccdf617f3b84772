use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum UserRole {
    Teacher,
    Student,
}

impl UserRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum QuestionType {
    Text,
    MultipleChoice,
    Image,
    Audio,
    Video,
}

/// Ordered: a submission's status only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SubmissionStatus {
    Submitted,
    AiGraded,
    FeedbackReleased,
}

impl SubmissionStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::AiGraded => "ai_graded",
            Self::FeedbackReleased => "feedback_released",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_order_follows_review_flow() {
        assert!(SubmissionStatus::Submitted < SubmissionStatus::AiGraded);
        assert!(SubmissionStatus::AiGraded < SubmissionStatus::FeedbackReleased);
    }

    #[test]
    fn wire_names_are_snake_case() {
        assert_eq!(serde_json::to_value(QuestionType::MultipleChoice).unwrap(), "multiple_choice");
        assert_eq!(serde_json::to_value(SubmissionStatus::AiGraded).unwrap(), "ai_graded");
        assert_eq!(serde_json::to_value(UserRole::Teacher).unwrap(), "teacher");
    }
}
