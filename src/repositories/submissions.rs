use crate::db::models::Submission;
use crate::store::aggregate::{self, Change};
use crate::store::backend::Blob;
use crate::store::{paths, CachePolicy, DocumentStore, StorageError};

pub(crate) async fn find(
    store: &DocumentStore,
    homework_id: &str,
    student_email: &str,
) -> Result<Option<Submission>, StorageError> {
    let path = paths::submission_document(homework_id, student_email)?;
    store.get_json(&path, CachePolicy::Bypass).await
}

pub(crate) async fn save(store: &DocumentStore, submission: &Submission) -> Result<(), StorageError> {
    let path = paths::submission_document(&submission.homework_id, &submission.student_email)?;
    store.put_json(&path, submission).await
}

/// Read-modify-write of one student's submission, conditional on the version read. `change`
/// sees `None` when nothing is stored yet and may run again after a concurrent write.
pub(crate) async fn update<R, E, F>(
    store: &DocumentStore,
    homework_id: &str,
    student_email: &str,
    change: F,
) -> Result<R, E>
where
    E: From<StorageError>,
    F: FnMut(&mut Option<Submission>) -> Result<Change<R>, E>,
{
    let path = paths::submission_document(homework_id, student_email)?;
    aggregate::update(store, &path, change).await
}

/// Every submission stored for the homework, one per student folder. Folders without a
/// submission document (attachments uploaded before submitting) are skipped.
pub(crate) async fn list_for_homework(
    store: &DocumentStore,
    homework_id: &str,
) -> Result<Vec<Submission>, StorageError> {
    let folder = paths::homework_submissions(homework_id)?;
    let entries = store.list_children(&folder, CachePolicy::Short).await?;

    let mut submissions = Vec::with_capacity(entries.len());
    for entry in entries.iter().filter(|entry| entry.is_folder()) {
        let document = paths::submission_document_in(&folder.join(&entry.name)?)?;
        match store.get_json::<Submission>(&document, CachePolicy::Short).await? {
            Some(submission) => submissions.push(submission),
            None => tracing::debug!(folder = %entry.name, "Student folder has no submission yet"),
        }
    }
    submissions.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
    Ok(submissions)
}

pub(crate) async fn put_attachment(
    store: &DocumentStore,
    homework_id: &str,
    student_email: &str,
    filename: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<(), StorageError> {
    let path = paths::submission_attachment(homework_id, student_email, filename)?;
    store.put_bytes(&path, bytes, content_type).await
}

pub(crate) async fn get_attachment(
    store: &DocumentStore,
    homework_id: &str,
    student_email: &str,
    filename: &str,
) -> Result<Option<Blob>, StorageError> {
    let path = paths::submission_attachment(homework_id, student_email, filename)?;
    store.get_blob(&path, CachePolicy::Bypass).await
}

/// Removes every submission and attachment of the homework.
pub(crate) async fn delete_for_homework(
    store: &DocumentStore,
    homework_id: &str,
) -> Result<(), StorageError> {
    store.delete(&paths::homework_submissions(homework_id)?).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Answer, Review};
    use std::collections::BTreeMap;
    use time::macros::datetime;
    use crate::test_support::memory_store;

    fn submission(homework_id: &str, email: &str) -> Submission {
        Submission {
            submission_id: format!("{homework_id}-{email}"),
            homework_id: homework_id.to_string(),
            student_email: email.to_string(),
            answers: BTreeMap::from([("q1".to_string(), Answer::default())]),
            submitted_at: datetime!(2025-02-01 9:00 UTC),
            updated_at: datetime!(2025-02-01 9:00 UTC),
            review: Review::Submitted,
        }
    }

    #[tokio::test]
    async fn listing_skips_folders_without_a_document() {
        let store = memory_store();
        save(&store, &submission("hw-1", "a@example.com")).await.unwrap();
        save(&store, &submission("hw-1", "b@example.com")).await.unwrap();
        save(&store, &submission("hw-2", "a@example.com")).await.unwrap();
        put_attachment(&store, "hw-1", "c@example.com", "photo.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();

        let listed = list_for_homework(&store, "hw-1").await.unwrap();

        let mut emails: Vec<_> = listed.iter().map(|s| s.student_email.as_str()).collect();
        emails.sort();
        assert_eq!(emails, vec!["a@example.com", "b@example.com"]);
    }

    #[tokio::test]
    async fn attachments_round_trip_and_are_deleted_with_the_homework() {
        let store = memory_store();
        save(&store, &submission("hw-1", "a@example.com")).await.unwrap();
        put_attachment(&store, "hw-1", "a@example.com", "audio.webm", vec![9; 16], "audio/webm")
            .await
            .unwrap();

        let stored = get_attachment(&store, "hw-1", "a@example.com", "audio.webm")
            .await
            .unwrap()
            .expect("attachment");
        assert_eq!(stored.bytes, vec![9; 16]);
        assert_eq!(stored.content_type.as_deref(), Some("audio/webm"));

        delete_for_homework(&store, "hw-1").await.unwrap();

        assert!(find(&store, "hw-1", "a@example.com").await.unwrap().is_none());
        assert!(get_attachment(&store, "hw-1", "a@example.com", "audio.webm")
            .await
            .unwrap()
            .is_none());
        assert!(list_for_homework(&store, "hw-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsafe_attachment_names_are_rejected() {
        let store = memory_store();
        let err = put_attachment(&store, "hw-1", "a@example.com", "..", vec![], "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath { .. }));
    }
}
