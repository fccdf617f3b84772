use crate::db::models::Homework;
use crate::store::aggregate::{self, Change};
use crate::store::{paths, CachePolicy, DocumentStore, StorageError};

pub(crate) async fn list_all(
    store: &DocumentStore,
    policy: CachePolicy,
) -> Result<Vec<Homework>, StorageError> {
    aggregate::load_all(store, &paths::all_homework(), policy).await
}

pub(crate) async fn find_by_id(
    store: &DocumentStore,
    homework_id: &str,
) -> Result<Option<Homework>, StorageError> {
    let all = list_all(store, CachePolicy::Short).await?;
    Ok(all.into_iter().find(|homework| homework.homework_id == homework_id))
}

/// Homework shared with the whole course; remedial variants are left out.
pub(crate) async fn list_for_course(
    store: &DocumentStore,
    course_id: &str,
) -> Result<Vec<Homework>, StorageError> {
    let mut all = list_all(store, CachePolicy::Short).await?;
    all.retain(|homework| homework.course_id == course_id && !homework.is_remedial());
    Ok(all)
}

/// Shared homework of the course plus the remedial variants made for this student.
pub(crate) async fn list_for_student_course(
    store: &DocumentStore,
    course_id: &str,
    student_email: &str,
) -> Result<Vec<Homework>, StorageError> {
    let mut all = list_all(store, CachePolicy::Short).await?;
    all.retain(|homework| {
        homework.course_id == course_id
            && homework
                .student_email
                .as_deref()
                .map_or(true, |owner| owner.eq_ignore_ascii_case(student_email))
    });
    Ok(all)
}

pub(crate) async fn create(store: &DocumentStore, homework: &Homework) -> Result<(), StorageError> {
    aggregate::update(store, &paths::all_homework(), |all: &mut Vec<Homework>| {
        all.push(homework.clone());
        Ok::<_, StorageError>(Change::Write(()))
    })
    .await?;
    tracing::info!(
        homework_id = %homework.homework_id,
        course_id = %homework.course_id,
        questions = homework.questions.len(),
        "Created homework"
    );
    Ok(())
}

/// Drops every homework of the course, remedial variants included, and returns their ids.
pub(crate) async fn remove_for_course(
    store: &DocumentStore,
    course_id: &str,
) -> Result<Vec<String>, StorageError> {
    aggregate::update(store, &paths::all_homework(), |all: &mut Vec<Homework>| {
        let removed: Vec<String> = all
            .iter()
            .filter(|homework| homework.course_id == course_id)
            .map(|homework| homework.homework_id.clone())
            .collect();
        if removed.is_empty() {
            return Ok::<_, StorageError>(Change::Keep(removed));
        }
        all.retain(|homework| homework.course_id != course_id);
        Ok(Change::Write(removed))
    })
    .await
}
