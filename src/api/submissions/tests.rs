use crate::db::types::UserRole;
use crate::test_support::{self, TestContext};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

struct Setup {
    teacher: String,
    student: String,
    homework_id: String,
}

async fn call(
    ctx: &TestContext,
    method: Method,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(method, uri, Some(token), body))
        .await
        .expect("response");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

async fn setup(ctx: &TestContext) -> Setup {
    let teacher = test_support::sign_in(ctx, "t@example.com", Some(UserRole::Teacher)).await;
    let student = test_support::sign_in(ctx, "s@example.com", Some(UserRole::Student)).await;

    let (_, course) = call(
        ctx,
        Method::POST,
        "/api/v1/courses",
        &teacher,
        Some(json!({"course_name": "Geometry"})),
    )
    .await;
    let course_id = course["course_id"].as_str().expect("course id").to_string();
    call(
        ctx,
        Method::POST,
        "/api/v1/courses/join",
        &student,
        Some(json!({"join_code": course["join_code"]})),
    )
    .await;

    let (status, homework) = call(
        ctx,
        Method::POST,
        &format!("/api/v1/courses/{course_id}/homework"),
        &teacher,
        Some(json!({
            "title": "Triangles",
            "questions": [
                {"id": "q1", "type": "text", "question": "Sum of angles?"},
                {"id": "q2", "type": "image", "question": "Sketch it"}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "response: {homework}");

    Setup {
        teacher,
        student,
        homework_id: homework["homework_id"].as_str().expect("homework id").to_string(),
    }
}

fn upload(uri: &str, token: &str, content_type: &str, bytes: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(bytes))
        .expect("upload request")
}

#[tokio::test]
async fn full_review_flow() {
    let ctx = test_support::setup_test_context().await;
    let Setup { teacher, student, homework_id } = setup(&ctx).await;

    let response = ctx
        .app
        .clone()
        .oneshot(upload(
            &format!("/api/v1/homework/{homework_id}/attachments/sketch.png"),
            &student,
            "image/png",
            vec![137, 80, 78, 71],
        ))
        .await
        .expect("upload");
    let status = response.status();
    let uploaded = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {uploaded}");
    assert_eq!(uploaded["size"], 4);

    let (status, submission) = call(
        &ctx,
        Method::PUT,
        &format!("/api/v1/homework/{homework_id}/submission"),
        &student,
        Some(json!({"answers": {
            "q1": {"text": "180 degrees"},
            "q2": {"attachments": ["sketch.png"]}
        }})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {submission}");
    assert_eq!(submission["status"], "submitted");

    let (status, listed) = call(
        &ctx,
        Method::GET,
        &format!("/api/v1/homework/{homework_id}/submissions"),
        &teacher,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let raw = "```json\n{\"grades\": [{\"question_id\": \"q1\", \"score\": 1, \"max_score\": 1, \"feedback\": \"Correct\"}]}\n```";
    let (status, graded) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/homework/{homework_id}/ai-grades"),
        &teacher,
        Some(json!({"student_email": "s@example.com", "raw_output": raw})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {graded}");
    assert_eq!(graded["status"], "ai_graded");
    assert_eq!(graded["ai_detailed_grades"][0]["feedback"], "Correct");

    let (status, released) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/homework/{homework_id}/release"),
        &teacher,
        Some(json!({
            "student_email": "s@example.com",
            "teacher_feedback": "Well done",
            "final_score": 9.5
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {released}");
    assert_eq!(released["status"], "feedback_released");
    assert_eq!(released["final_score"], 9.5);
    assert_eq!(released["ai_detailed_grades"][0]["score"], 1.0);

    let (status, _) = call(
        &ctx,
        Method::PUT,
        &format!("/api/v1/homework/{homework_id}/submission"),
        &student,
        Some(json!({"answers": {"q1": {"text": "changed my mind"}}})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!(
                "/api/v1/homework/{homework_id}/attachments/sketch.png?student_email=s@example.com"
            ),
            Some(&teacher),
            None,
        ))
        .await
        .expect("download");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    assert_eq!(body.to_vec(), vec![137, 80, 78, 71]);
}

#[tokio::test]
async fn unparseable_ai_output_is_unprocessable() {
    let ctx = test_support::setup_test_context().await;
    let Setup { teacher, student, homework_id } = setup(&ctx).await;
    call(
        &ctx,
        Method::PUT,
        &format!("/api/v1/homework/{homework_id}/submission"),
        &student,
        Some(json!({"answers": {"q1": {"text": "180"}}})),
    )
    .await;

    let (status, _) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/homework/{homework_id}/ai-grades"),
        &teacher,
        Some(json!({"student_email": "s@example.com", "raw_output": "no idea, sorry"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn uploads_with_bad_names_or_types_are_rejected() {
    let ctx = test_support::setup_test_context().await;
    let Setup { student, homework_id, .. } = setup(&ctx).await;

    let cases = [("notes.exe", "application/octet-stream"), ("photo.png", "image/jpeg")];
    for (name, content_type) in cases {
        let response = ctx
            .app
            .clone()
            .oneshot(upload(
                &format!("/api/v1/homework/{homework_id}/attachments/{name}"),
                &student,
                content_type,
                vec![1, 2, 3],
            ))
            .await
            .expect("upload");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{name}");
    }
}

#[tokio::test]
async fn other_teachers_cannot_see_submissions() {
    let ctx = test_support::setup_test_context().await;
    let Setup { homework_id, .. } = setup(&ctx).await;
    let stranger = test_support::sign_in(&ctx, "x@example.com", Some(UserRole::Teacher)).await;

    let (status, _) = call(
        &ctx,
        Method::GET,
        &format!("/api/v1/homework/{homework_id}/submissions"),
        &stranger,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &ctx,
        Method::GET,
        "/api/v1/homework/does-not-exist/submissions",
        &stranger,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
