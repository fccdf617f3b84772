//! Answer submission and the review flow `submitted -> ai_graded -> feedback_released`.
//!
//! Status never moves backwards. A released submission can still have its feedback edited,
//! but students can no longer change answers once grading has started.

use std::collections::BTreeMap;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::models::{Answer, Homework, QuestionGrade, Review, Submission, UserProfile};
use crate::db::types::{SubmissionStatus, UserRole};
use crate::repositories;
use crate::services::accounts::require_role;
use crate::services::{ai_output, course_admin, ServiceError};
use crate::store::aggregate::Change;
use crate::store::backend::Blob;
use crate::store::DocumentStore;

pub(crate) struct ReleaseFeedback {
    pub(crate) student_email: String,
    pub(crate) teacher_feedback: String,
    pub(crate) final_score: Option<f64>,
}

/// Homework the student may answer: a member of its course, and the owner if it is remedial.
async fn homework_for_student(
    store: &DocumentStore,
    student: &UserProfile,
    homework_id: &str,
) -> Result<Homework, ServiceError> {
    require_role(student, UserRole::Student)?;
    let homework = repositories::homework::find_by_id(store, homework_id)
        .await?
        .ok_or(ServiceError::NotFound("Homework"))?;

    if let Some(owner) = homework.student_email.as_deref() {
        if !owner.eq_ignore_ascii_case(&student.email) {
            return Err(ServiceError::NotFound("Homework"));
        }
    }

    let course = repositories::courses::find_by_id(store, &homework.course_id)
        .await?
        .ok_or(ServiceError::NotFound("Course"))?;
    if !course.has_student(&student.email) {
        return Err(ServiceError::Forbidden("Not a member of this course"));
    }
    Ok(homework)
}

/// Homework of a course the teacher owns.
pub(crate) async fn homework_for_teacher(
    store: &DocumentStore,
    teacher: &UserProfile,
    homework_id: &str,
) -> Result<Homework, ServiceError> {
    let homework = repositories::homework::find_by_id(store, homework_id)
        .await?
        .ok_or(ServiceError::NotFound("Homework"))?;
    course_admin::owned_course(store, teacher, &homework.course_id).await?;
    Ok(homework)
}

fn validate_answers(
    homework: &Homework,
    answers: &BTreeMap<String, Answer>,
) -> Result<(), ServiceError> {
    if answers.is_empty() {
        return Err(ServiceError::invalid("Submit at least one answer"));
    }
    if let Some(unknown) = answers.keys().find(|id| homework.question(id).is_none()) {
        return Err(ServiceError::invalid(format!("Unknown question {unknown}")));
    }
    Ok(())
}

fn validate_grades(homework: &Homework, grades: &[QuestionGrade]) -> Result<(), ServiceError> {
    for grade in grades {
        if homework.question(&grade.question_id).is_none() {
            return Err(ServiceError::invalid(format!("Unknown question {}", grade.question_id)));
        }
        let in_range = grade.max_score.is_finite()
            && grade.max_score > 0.0
            && grade.score.is_finite()
            && (0.0..=grade.max_score).contains(&grade.score);
        if !in_range {
            return Err(ServiceError::invalid(format!(
                "Score for question {} is out of range",
                grade.question_id
            )));
        }
    }
    Ok(())
}

pub(crate) async fn submit_answers(
    store: &DocumentStore,
    student: &UserProfile,
    homework_id: &str,
    answers: BTreeMap<String, Answer>,
    now: OffsetDateTime,
) -> Result<Submission, ServiceError> {
    let homework = homework_for_student(store, student, homework_id).await?;
    validate_answers(&homework, &answers)?;

    let submission = repositories::submissions::update(
        store,
        homework_id,
        &student.email,
        |current: &mut Option<Submission>| {
            let next = match current.as_ref() {
                Some(existing) if existing.status() > SubmissionStatus::Submitted => {
                    return Err(ServiceError::Conflict(
                        "Submission can no longer be changed".to_string(),
                    ));
                }
                Some(existing) => {
                    Submission { answers: answers.clone(), updated_at: now, ..existing.clone() }
                }
                None => Submission {
                    submission_id: Uuid::new_v4().to_string(),
                    homework_id: homework.homework_id.clone(),
                    student_email: student.email.clone(),
                    answers: answers.clone(),
                    submitted_at: now,
                    updated_at: now,
                    review: Review::Submitted,
                },
            };
            *current = Some(next.clone());
            Ok(Change::Write(next))
        },
    )
    .await?;
    tracing::info!(
        homework_id = %submission.homework_id,
        student = %submission.student_email,
        answers = submission.answers.len(),
        "Stored submission"
    );
    Ok(submission)
}

pub(crate) async fn upload_attachment(
    store: &DocumentStore,
    student: &UserProfile,
    homework_id: &str,
    filename: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<(), ServiceError> {
    homework_for_student(store, student, homework_id).await?;
    if bytes.is_empty() {
        return Err(ServiceError::invalid("Attachment is empty"));
    }
    if let Some(existing) = repositories::submissions::find(store, homework_id, &student.email).await? {
        if existing.status() > SubmissionStatus::Submitted {
            return Err(ServiceError::Conflict(
                "Submission can no longer be changed".to_string(),
            ));
        }
    }

    let size = bytes.len();
    repositories::submissions::put_attachment(
        store,
        homework_id,
        &student.email,
        filename,
        bytes,
        content_type,
    )
    .await?;
    tracing::info!(homework_id, student = %student.email, filename, size, "Stored attachment");
    Ok(())
}

pub(crate) async fn record_ai_grades(
    store: &DocumentStore,
    homework_id: &str,
    student_email: &str,
    grades: Vec<QuestionGrade>,
    now: OffsetDateTime,
) -> Result<Submission, ServiceError> {
    let homework = repositories::homework::find_by_id(store, homework_id)
        .await?
        .ok_or(ServiceError::NotFound("Homework"))?;
    validate_grades(&homework, &grades)?;

    let submission = repositories::submissions::update(
        store,
        homework_id,
        student_email,
        |current: &mut Option<Submission>| {
            let submission = current.as_mut().ok_or(ServiceError::NotFound("Submission"))?;
            if submission.status() > SubmissionStatus::AiGraded {
                return Err(ServiceError::Conflict(
                    "Feedback has already been released".to_string(),
                ));
            }
            submission.review =
                Review::AiGraded { ai_graded_at: now, ai_detailed_grades: grades.clone() };
            submission.updated_at = now;
            Ok(Change::Write(submission.clone()))
        },
    )
    .await?;
    tracing::info!(homework_id, student = %student_email, "Recorded AI grades");
    Ok(submission)
}

/// Parses raw model output and records the grades it contains.
pub(crate) async fn record_ai_output(
    store: &DocumentStore,
    homework_id: &str,
    student_email: &str,
    raw_output: &str,
    now: OffsetDateTime,
) -> Result<Submission, ServiceError> {
    let grades = ai_output::parse_grades(raw_output).map_err(|err| {
        tracing::warn!(homework_id, student = %student_email, error = %err, "Unusable AI output");
        err
    })?;
    record_ai_grades(store, homework_id, student_email, grades, now).await
}

pub(crate) async fn release_feedback(
    store: &DocumentStore,
    teacher: &UserProfile,
    homework_id: &str,
    release: ReleaseFeedback,
    now: OffsetDateTime,
) -> Result<Submission, ServiceError> {
    homework_for_teacher(store, teacher, homework_id).await?;
    if release.teacher_feedback.trim().is_empty() {
        return Err(ServiceError::invalid("Feedback must not be empty"));
    }
    if let Some(score) = release.final_score {
        if !score.is_finite() || score < 0.0 {
            return Err(ServiceError::invalid("Final score must be a non-negative number"));
        }
    }

    let submission = repositories::submissions::update(
        store,
        homework_id,
        &release.student_email,
        |current: &mut Option<Submission>| {
            let submission = current.as_mut().ok_or(ServiceError::NotFound("Submission"))?;
            let released_at = match &submission.review {
                Review::FeedbackReleased { released_at, .. } => *released_at,
                _ => now,
            };
            submission.review = Review::FeedbackReleased {
                ai_detailed_grades: submission.review.ai_grades().map(<[QuestionGrade]>::to_vec),
                teacher_feedback: release.teacher_feedback.clone(),
                final_score: release.final_score,
                released_at,
            };
            submission.updated_at = now;
            Ok::<_, ServiceError>(Change::Write(submission.clone()))
        },
    )
    .await?;

    tracing::info!(
        homework_id,
        student = %submission.student_email,
        final_score = ?release.final_score,
        "Released feedback"
    );
    Ok(submission)
}

pub(crate) async fn list_submissions(
    store: &DocumentStore,
    teacher: &UserProfile,
    homework_id: &str,
) -> Result<Vec<Submission>, ServiceError> {
    homework_for_teacher(store, teacher, homework_id).await?;
    Ok(repositories::submissions::list_for_homework(store, homework_id).await?)
}

/// Students read their own attachments; the course teacher reads any student's.
pub(crate) async fn read_attachment(
    store: &DocumentStore,
    viewer: &UserProfile,
    homework_id: &str,
    student_email: Option<&str>,
    filename: &str,
) -> Result<Blob, ServiceError> {
    let owner = match viewer.role {
        Some(UserRole::Student) => {
            homework_for_student(store, viewer, homework_id).await?;
            viewer.email.clone()
        }
        _ => {
            homework_for_teacher(store, viewer, homework_id).await?;
            student_email
                .map(|email| email.trim().to_lowercase())
                .ok_or_else(|| ServiceError::invalid("student_email is required"))?
        }
    };

    repositories::submissions::get_attachment(store, homework_id, &owner, filename)
        .await?
        .ok_or(ServiceError::NotFound("Attachment"))
}
