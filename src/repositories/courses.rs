use time::OffsetDateTime;

use crate::db::models::Course;
use crate::store::aggregate::{self, Change};
use crate::store::{paths, CachePolicy, DocumentStore, StorageError};

pub(crate) struct CreateCourse<'a> {
    pub(crate) course_id: &'a str,
    pub(crate) course_name: &'a str,
    pub(crate) teacher_email: &'a str,
    pub(crate) created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JoinOutcome {
    Joined(Course),
    AlreadyMember(Course),
    UnknownCode,
}

pub(crate) async fn list_all(
    store: &DocumentStore,
    policy: CachePolicy,
) -> Result<Vec<Course>, StorageError> {
    aggregate::load_all(store, &paths::all_courses(), policy).await
}

pub(crate) async fn find_by_id(
    store: &DocumentStore,
    course_id: &str,
) -> Result<Option<Course>, StorageError> {
    let courses = list_all(store, CachePolicy::Short).await?;
    Ok(courses.into_iter().find(|course| course.course_id == course_id))
}

pub(crate) async fn find_by_join_code(
    store: &DocumentStore,
    join_code: &str,
) -> Result<Option<Course>, StorageError> {
    let courses = list_all(store, CachePolicy::Bypass).await?;
    Ok(courses.into_iter().find(|course| course.join_code.eq_ignore_ascii_case(join_code)))
}

pub(crate) async fn list_for_teacher(
    store: &DocumentStore,
    teacher_email: &str,
) -> Result<Vec<Course>, StorageError> {
    let mut courses = list_all(store, CachePolicy::Short).await?;
    courses.retain(|course| course.is_taught_by(teacher_email));
    Ok(courses)
}

pub(crate) async fn list_for_student(
    store: &DocumentStore,
    student_email: &str,
) -> Result<Vec<Course>, StorageError> {
    let mut courses = list_all(store, CachePolicy::Short).await?;
    courses.retain(|course| course.has_student(student_email));
    Ok(courses)
}

/// Appends a course. `next_join_code` is asked again until it yields a code no other course
/// uses, checked against the list as it is being written.
pub(crate) async fn create(
    store: &DocumentStore,
    params: CreateCourse<'_>,
    mut next_join_code: impl FnMut() -> String,
) -> Result<Course, StorageError> {
    aggregate::update(store, &paths::all_courses(), |courses: &mut Vec<Course>| {
        let join_code = loop {
            let candidate = next_join_code();
            if !courses.iter().any(|course| course.join_code.eq_ignore_ascii_case(&candidate)) {
                break candidate;
            }
        };
        let course = Course {
            course_id: params.course_id.to_string(),
            course_name: params.course_name.to_string(),
            teacher_email: params.teacher_email.to_string(),
            join_code,
            student_emails: Vec::new(),
            created_at: params.created_at,
        };
        courses.push(course.clone());
        Ok::<_, StorageError>(Change::Write(course))
    })
    .await
}

pub(crate) async fn add_student(
    store: &DocumentStore,
    join_code: &str,
    student_email: &str,
) -> Result<JoinOutcome, StorageError> {
    aggregate::update(store, &paths::all_courses(), |courses: &mut Vec<Course>| {
        let Some(course) =
            courses.iter_mut().find(|course| course.join_code.eq_ignore_ascii_case(join_code))
        else {
            return Ok::<_, StorageError>(Change::Keep(JoinOutcome::UnknownCode));
        };
        if course.has_student(student_email) {
            return Ok(Change::Keep(JoinOutcome::AlreadyMember(course.clone())));
        }
        course.student_emails.push(student_email.to_string());
        Ok(Change::Write(JoinOutcome::Joined(course.clone())))
    })
    .await
}

/// Returns whether a course was removed.
pub(crate) async fn remove(store: &DocumentStore, course_id: &str) -> Result<bool, StorageError> {
    aggregate::update(store, &paths::all_courses(), |courses: &mut Vec<Course>| {
        let before = courses.len();
        courses.retain(|course| course.course_id != course_id);
        if courses.len() == before {
            Ok::<_, StorageError>(Change::Keep(false))
        } else {
            Ok(Change::Write(true))
        }
    })
    .await
}
