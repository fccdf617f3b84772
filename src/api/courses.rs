use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentStudent, CurrentTeacher, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::now_utc;
use crate::schemas::course::{CourseCreate, CourseResponse, JoinCourseRequest, JoinCourseResponse};
use crate::schemas::homework::{HomeworkCreate, HomeworkResponse};
use crate::services::course_admin::{self, CascadeReport, NewHomework};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route("/join", post(join_course))
        .route("/:course_id", delete(delete_course))
        .route("/:course_id/homework", get(list_homework).post(create_homework))
}

async fn list_courses(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CourseResponse>>, ApiError> {
    let courses = course_admin::list_courses(state.store(), &user).await?;
    Ok(Json(
        courses.into_iter().map(|course| CourseResponse::for_viewer(course, &user.email)).collect(),
    ))
}

async fn create_course(
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<CourseCreate>,
) -> Result<(StatusCode, Json<CourseResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let course =
        course_admin::create_course(state.store(), &teacher, &payload.course_name, now_utc())
            .await?;
    Ok((StatusCode::CREATED, Json(CourseResponse::for_viewer(course, &teacher.email))))
}

async fn join_course(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<JoinCourseRequest>,
) -> Result<Json<JoinCourseResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let joined = course_admin::join_course(state.store(), &student, &payload.join_code).await?;
    Ok(Json(JoinCourseResponse {
        course: CourseResponse::for_viewer(joined.course, &student.email),
        already_member: joined.already_member,
    }))
}

async fn delete_course(
    Path(course_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<CascadeReport>, ApiError> {
    let report = course_admin::delete_course(state.store(), &teacher, &course_id).await?;
    Ok(Json(report))
}

async fn list_homework(
    Path(course_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<HomeworkResponse>>, ApiError> {
    let homework = course_admin::list_homework(state.store(), &user, &course_id).await?;
    Ok(Json(homework.into_iter().map(HomeworkResponse::from).collect()))
}

async fn create_homework(
    Path(course_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<HomeworkCreate>,
) -> Result<(StatusCode, Json<HomeworkResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let draft = NewHomework {
        title: payload.title,
        questions: payload.questions.into_iter().map(Into::into).collect(),
        student_email: payload.student_email,
        original_homework_id: payload.original_homework_id,
    };
    let homework =
        course_admin::create_homework(state.store(), &teacher, &course_id, draft, now_utc())
            .await?;
    Ok((StatusCode::CREATED, Json(HomeworkResponse::from(homework))))
}
