use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentStudent, CurrentTeacher, CurrentUser};
use crate::api::validation::validate_attachment;
use crate::core::state::AppState;
use crate::core::time::now_utc;
use crate::schemas::submission::{
    AiGradesRequest, AttachmentQuery, AttachmentResponse, ReleaseRequest, SubmissionResponse,
    SubmissionUpsert,
};
use crate::services::submission_review::{self, ReleaseFeedback};

const MAX_ATTACHMENT_BYTES: usize = 25 * 1024 * 1024;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:homework_id/submission", put(submit))
        .route("/:homework_id/submissions", get(list_submissions))
        .route(
            "/:homework_id/attachments/:filename",
            put(upload_attachment).get(download_attachment),
        )
        .route("/:homework_id/ai-grades", post(record_ai_grades))
        .route("/:homework_id/release", post(release_feedback))
        .layer(DefaultBodyLimit::max(MAX_ATTACHMENT_BYTES))
}

async fn submit(
    Path(homework_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<SubmissionUpsert>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = submission_review::submit_answers(
        state.store(),
        &student,
        &homework_id,
        payload.answers,
        now_utc(),
    )
    .await?;
    Ok(Json(SubmissionResponse::from(submission)))
}

async fn upload_attachment(
    Path((homework_id, filename)): Path<(String, String)>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<AttachmentResponse>), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    validate_attachment(&filename, &content_type)?;

    let size = body.len();
    submission_review::upload_attachment(
        state.store(),
        &student,
        &homework_id,
        &filename,
        body.to_vec(),
        &content_type,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AttachmentResponse { homework_id, filename, size, content_type }),
    ))
}

async fn download_attachment(
    Path((homework_id, filename)): Path<(String, String)>,
    Query(query): Query<AttachmentQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let blob = submission_review::read_attachment(
        state.store(),
        &user,
        &homework_id,
        query.student_email.as_deref(),
        &filename,
    )
    .await?;
    let content_type =
        blob.content_type.unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(([(header::CONTENT_TYPE, content_type)], blob.bytes))
}

async fn list_submissions(
    Path(homework_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Vec<SubmissionResponse>>, ApiError> {
    let submissions =
        submission_review::list_submissions(state.store(), &teacher, &homework_id).await?;
    Ok(Json(submissions.into_iter().map(SubmissionResponse::from).collect()))
}

async fn record_ai_grades(
    Path(homework_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<AiGradesRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    submission_review::homework_for_teacher(state.store(), &teacher, &homework_id).await?;

    let student_email = payload.student_email.trim().to_lowercase();
    let submission = match (payload.grades, payload.raw_output) {
        (Some(grades), None) => {
            submission_review::record_ai_grades(
                state.store(),
                &homework_id,
                &student_email,
                grades,
                now_utc(),
            )
            .await?
        }
        (None, Some(raw)) => {
            submission_review::record_ai_output(
                state.store(),
                &homework_id,
                &student_email,
                &raw,
                now_utc(),
            )
            .await?
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Provide either grades or raw_output".to_string(),
            ))
        }
    };
    Ok(Json(SubmissionResponse::from(submission)))
}

async fn release_feedback(
    Path(homework_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<ReleaseRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let release = ReleaseFeedback {
        student_email: payload.student_email.trim().to_lowercase(),
        teacher_feedback: payload.teacher_feedback,
        final_score: payload.final_score,
    };
    let submission =
        submission_review::release_feedback(state.store(), &teacher, &homework_id, release, now_utc())
            .await?;
    Ok(Json(SubmissionResponse::from(submission)))
}

#[cfg(test)]
mod tests;
