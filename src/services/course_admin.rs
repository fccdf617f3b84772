use std::collections::HashSet;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::models::{Course, Homework, Question, UserProfile};
use crate::db::types::{QuestionType, UserRole};
use crate::repositories;
use crate::repositories::courses::{CreateCourse, JoinOutcome};
use crate::services::accounts::require_role;
use crate::services::join_codes;
use crate::services::ServiceError;
use crate::store::{CachePolicy, DocumentStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct CascadeReport {
    pub(crate) course_id: String,
    pub(crate) homework_removed: Vec<String>,
    /// Homework whose submission folders were swept, including ones nobody had submitted to.
    pub(crate) homework_swept: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct JoinResult {
    pub(crate) course: Course,
    pub(crate) already_member: bool,
}

pub(crate) async fn create_course(
    store: &DocumentStore,
    teacher: &UserProfile,
    course_name: &str,
    now: OffsetDateTime,
) -> Result<Course, ServiceError> {
    require_role(teacher, UserRole::Teacher)?;
    let course_name = course_name.trim();
    if course_name.is_empty() {
        return Err(ServiceError::invalid("Course name must not be empty"));
    }

    let course_id = Uuid::new_v4().to_string();
    let course = repositories::courses::create(
        store,
        CreateCourse {
            course_id: &course_id,
            course_name,
            teacher_email: &teacher.email,
            created_at: now,
        },
        join_codes::generate_join_code,
    )
    .await?;

    tracing::info!(
        course_id = %course.course_id,
        teacher = %course.teacher_email,
        "Created course"
    );
    Ok(course)
}

pub(crate) async fn join_course(
    store: &DocumentStore,
    student: &UserProfile,
    raw_code: &str,
) -> Result<JoinResult, ServiceError> {
    require_role(student, UserRole::Student)?;
    let join_code = join_codes::normalize_join_code(raw_code);
    if join_code.len() != join_codes::JOIN_CODE_LEN {
        return Err(ServiceError::invalid("Join code must have 6 characters"));
    }

    match repositories::courses::add_student(store, &join_code, &student.email).await? {
        JoinOutcome::Joined(course) => {
            tracing::info!(
                course_id = %course.course_id,
                student = %student.email,
                "Student joined course"
            );
            Ok(JoinResult { course, already_member: false })
        }
        JoinOutcome::AlreadyMember(course) => Ok(JoinResult { course, already_member: true }),
        JoinOutcome::UnknownCode => Err(ServiceError::NotFound("Course")),
    }
}

pub(crate) async fn list_courses(
    store: &DocumentStore,
    user: &UserProfile,
) -> Result<Vec<Course>, ServiceError> {
    match user.role {
        Some(UserRole::Teacher) => {
            Ok(repositories::courses::list_for_teacher(store, &user.email).await?)
        }
        Some(UserRole::Student) => {
            Ok(repositories::courses::list_for_student(store, &user.email).await?)
        }
        None => Err(ServiceError::Forbidden("Choose a role first")),
    }
}

/// The course, if `teacher` owns it.
pub(crate) async fn owned_course(
    store: &DocumentStore,
    teacher: &UserProfile,
    course_id: &str,
) -> Result<Course, ServiceError> {
    require_role(teacher, UserRole::Teacher)?;
    let course = repositories::courses::find_by_id(store, course_id)
        .await?
        .ok_or(ServiceError::NotFound("Course"))?;
    if !course.is_taught_by(&teacher.email) {
        return Err(ServiceError::Forbidden("Only the course teacher can do this"));
    }
    Ok(course)
}

/// Removes the course with all its homework and every submission made for it.
///
/// Submissions go first, then the homework list, then the course itself, so an interrupted
/// cascade can be repeated without leaving unreachable submissions behind.
pub(crate) async fn delete_course(
    store: &DocumentStore,
    teacher: &UserProfile,
    course_id: &str,
) -> Result<CascadeReport, ServiceError> {
    let course = owned_course(store, teacher, course_id).await?;

    let homework: Vec<Homework> = repositories::homework::list_all(store, CachePolicy::Bypass)
        .await?
        .into_iter()
        .filter(|homework| homework.course_id == course.course_id)
        .collect();

    for item in &homework {
        repositories::submissions::delete_for_homework(store, &item.homework_id).await?;
    }
    let homework_removed =
        repositories::homework::remove_for_course(store, &course.course_id).await?;
    repositories::courses::remove(store, &course.course_id).await?;

    let report = CascadeReport {
        course_id: course.course_id,
        homework_removed,
        homework_swept: homework.len(),
    };
    tracing::info!(
        course_id = %report.course_id,
        homework = report.homework_removed.len(),
        "Deleted course"
    );
    Ok(report)
}

fn validate_questions(questions: &[Question]) -> Result<(), ServiceError> {
    if questions.is_empty() {
        return Err(ServiceError::invalid("Homework needs at least one question"));
    }
    let mut seen = HashSet::new();
    for question in questions {
        if question.id.trim().is_empty() || question.question.trim().is_empty() {
            return Err(ServiceError::invalid("Questions need an id and a prompt"));
        }
        if !seen.insert(question.id.as_str()) {
            return Err(ServiceError::invalid(format!("Duplicate question id {}", question.id)));
        }
        let option_count = question.options.as_ref().map_or(0, Vec::len);
        if question.question_type == QuestionType::MultipleChoice && option_count < 2 {
            return Err(ServiceError::invalid(format!(
                "Question {} needs at least two options",
                question.id
            )));
        }
    }
    Ok(())
}

pub(crate) struct NewHomework {
    pub(crate) title: String,
    pub(crate) questions: Vec<Question>,
    pub(crate) student_email: Option<String>,
    pub(crate) original_homework_id: Option<String>,
}

pub(crate) async fn create_homework(
    store: &DocumentStore,
    teacher: &UserProfile,
    course_id: &str,
    draft: NewHomework,
    now: OffsetDateTime,
) -> Result<Homework, ServiceError> {
    let course = owned_course(store, teacher, course_id).await?;
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(ServiceError::invalid("Homework title must not be empty"));
    }
    validate_questions(&draft.questions)?;

    if let Some(student_email) = draft.student_email.as_deref() {
        if !course.has_student(student_email) {
            return Err(ServiceError::invalid("Remedial homework must target a course student"));
        }
        let Some(original_id) = draft.original_homework_id.as_deref() else {
            return Err(ServiceError::invalid("Remedial homework must name its original"));
        };
        let original = repositories::homework::find_by_id(store, original_id)
            .await?
            .ok_or(ServiceError::NotFound("Homework"))?;
        if original.course_id != course.course_id {
            return Err(ServiceError::invalid("Original homework belongs to another course"));
        }
    }

    let homework = Homework {
        homework_id: Uuid::new_v4().to_string(),
        course_id: course.course_id,
        title: title.to_string(),
        questions: draft.questions,
        student_email: draft.student_email.map(|email| email.trim().to_lowercase()),
        original_homework_id: draft.original_homework_id,
        created_at: now,
    };
    repositories::homework::create(store, &homework).await?;
    Ok(homework)
}

/// Teachers see the shared homework of their course; students also see their remedial variants.
pub(crate) async fn list_homework(
    store: &DocumentStore,
    user: &UserProfile,
    course_id: &str,
) -> Result<Vec<Homework>, ServiceError> {
    let course = repositories::courses::find_by_id(store, course_id)
        .await?
        .ok_or(ServiceError::NotFound("Course"))?;

    match user.role {
        Some(UserRole::Teacher) if course.is_taught_by(&user.email) => {
            Ok(repositories::homework::list_for_course(store, course_id).await?)
        }
        Some(UserRole::Student) if course.has_student(&user.email) => Ok(
            repositories::homework::list_for_student_course(store, course_id, &user.email).await?,
        ),
        _ => Err(ServiceError::Forbidden("Not a member of this course")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Answer, Review, Submission};
    use crate::test_support::{memory_store, profile};
    use std::collections::BTreeMap;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2025-02-01 9:00 UTC);

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            question_type: QuestionType::Text,
            question: "Explain".to_string(),
            options: None,
        }
    }

    fn draft(title: &str) -> NewHomework {
        NewHomework {
            title: title.to_string(),
            questions: vec![question("q1")],
            student_email: None,
            original_homework_id: None,
        }
    }

    #[tokio::test]
    async fn only_teachers_create_courses() {
        let store = memory_store();
        let student = profile("s@example.com", Some(UserRole::Student));
        let nobody = profile("n@example.com", None);

        assert!(matches!(
            create_course(&store, &student, "Algebra", NOW).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            create_course(&store, &nobody, "Algebra", NOW).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn students_join_with_a_sloppy_code() {
        let store = memory_store();
        let teacher = profile("t@example.com", Some(UserRole::Teacher));
        let student = profile("s@example.com", Some(UserRole::Student));
        let course = create_course(&store, &teacher, " Algebra ", NOW).await.unwrap();
        assert_eq!(course.course_name, "Algebra");

        let sloppy = format!(" {} ", course.join_code.to_lowercase());
        let joined = join_course(&store, &student, &sloppy).await.unwrap();
        let again = join_course(&store, &student, &course.join_code).await.unwrap();

        assert!(!joined.already_member);
        assert!(again.already_member);
        assert_eq!(list_courses(&store, &student).await.unwrap().len(), 1);
        assert_eq!(list_courses(&store, &teacher).await.unwrap().len(), 1);
        assert!(matches!(
            join_course(&store, &student, "ZZZZZZ").await,
            Err(ServiceError::NotFound("Course"))
        ));
    }

    #[tokio::test]
    async fn homework_validation() {
        let store = memory_store();
        let teacher = profile("t@example.com", Some(UserRole::Teacher));
        let course = create_course(&store, &teacher, "Algebra", NOW).await.unwrap();

        let mut duplicate = draft("Week 1");
        duplicate.questions = vec![question("q1"), question("q1")];
        let mut choice = draft("Week 1");
        choice.questions[0].question_type = QuestionType::MultipleChoice;

        for bad in [draft("  "), duplicate, choice] {
            assert!(matches!(
                create_homework(&store, &teacher, &course.course_id, bad, NOW).await,
                Err(ServiceError::InvalidInput(_))
            ));
        }

        let other = profile("other@example.com", Some(UserRole::Teacher));
        assert!(matches!(
            create_homework(&store, &other, &course.course_id, draft("Week 1"), NOW).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn remedial_homework_is_listed_for_its_student_only() {
        let store = memory_store();
        let teacher = profile("t@example.com", Some(UserRole::Teacher));
        let ann = profile("ann@example.com", Some(UserRole::Student));
        let bob = profile("bob@example.com", Some(UserRole::Student));
        let course = create_course(&store, &teacher, "Algebra", NOW).await.unwrap();
        join_course(&store, &ann, &course.join_code).await.unwrap();
        join_course(&store, &bob, &course.join_code).await.unwrap();

        let original =
            create_homework(&store, &teacher, &course.course_id, draft("Week 1"), NOW).await.unwrap();
        let mut remedial = draft("Week 1 (retry)");
        remedial.student_email = Some("ann@example.com".to_string());
        remedial.original_homework_id = Some(original.homework_id.clone());
        create_homework(&store, &teacher, &course.course_id, remedial, NOW).await.unwrap();

        assert_eq!(list_homework(&store, &ann, &course.course_id).await.unwrap().len(), 2);
        assert_eq!(list_homework(&store, &bob, &course.course_id).await.unwrap().len(), 1);
        assert_eq!(list_homework(&store, &teacher, &course.course_id).await.unwrap().len(), 1);

        let outsider = profile("eve@example.com", Some(UserRole::Student));
        assert!(matches!(
            list_homework(&store, &outsider, &course.course_id).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn delete_cascades_to_homework_and_submissions() {
        let store = memory_store();
        let teacher = profile("t@example.com", Some(UserRole::Teacher));
        let keep = create_course(&store, &teacher, "Keep", NOW).await.unwrap();
        let doomed = create_course(&store, &teacher, "Doomed", NOW).await.unwrap();
        let kept_hw =
            create_homework(&store, &teacher, &keep.course_id, draft("Stays"), NOW).await.unwrap();
        let doomed_hw =
            create_homework(&store, &teacher, &doomed.course_id, draft("Goes"), NOW).await.unwrap();

        for homework_id in [&kept_hw.homework_id, &doomed_hw.homework_id] {
            let submission = Submission {
                submission_id: Uuid::new_v4().to_string(),
                homework_id: homework_id.clone(),
                student_email: "s@example.com".to_string(),
                answers: BTreeMap::from([("q1".to_string(), Answer::default())]),
                submitted_at: NOW,
                updated_at: NOW,
                review: Review::Submitted,
            };
            repositories::submissions::save(&store, &submission).await.unwrap();
        }

        let stranger = profile("x@example.com", Some(UserRole::Teacher));
        assert!(matches!(
            delete_course(&store, &stranger, &doomed.course_id).await,
            Err(ServiceError::Forbidden(_))
        ));

        let report = delete_course(&store, &teacher, &doomed.course_id).await.unwrap();

        assert_eq!(report.homework_removed, vec![doomed_hw.homework_id.clone()]);
        assert_eq!(report.homework_swept, 1);
        assert!(repositories::courses::find_by_id(&store, &doomed.course_id).await.unwrap().is_none());
        assert!(repositories::submissions::find(&store, &doomed_hw.homework_id, "s@example.com")
            .await
            .unwrap()
            .is_none());
        assert!(repositories::submissions::find(&store, &kept_hw.homework_id, "s@example.com")
            .await
            .unwrap()
            .is_some());
        assert!(matches!(
            delete_course(&store, &teacher, &doomed.course_id).await,
            Err(ServiceError::NotFound("Course"))
        ));
    }
}
