//! Path synthesis for every record the application stores.
//!
//! Addresses are derived from a collection name and a stable identifier (a UUID assigned at
//! creation, or the hash of a normalized email), so looking a record up by its natural key
//! never needs a secondary index.

use std::fmt;

use sha2::{Digest, Sha256};

use super::error::StorageError;

pub(crate) const USERS: &str = "users";
pub(crate) const COURSES: &str = "courses";
pub(crate) const HOMEWORK: &str = "homework";
pub(crate) const SUBMISSIONS: &str = "submissions";
pub(crate) const AUTH: &str = "auth";

const SUBMISSION_DOCUMENT: &str = "submission.json";
const ATTACHMENTS: &str = "attachments";

/// A validated, root-relative blob address such as `users/ab12.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct BlobPath(String);

impl BlobPath {
    pub(crate) fn parse(raw: impl Into<String>) -> Result<Self, StorageError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(StorageError::InvalidPath { path: raw, reason: "path is empty" });
        }
        if raw.contains('\\') {
            return Err(StorageError::InvalidPath { path: raw, reason: "backslash in path" });
        }
        if raw.starts_with('/') || raw.ends_with('/') {
            return Err(StorageError::InvalidPath {
                path: raw,
                reason: "leading or trailing slash",
            });
        }
        for segment in raw.split('/') {
            validate_segment(segment).map_err(|reason| StorageError::InvalidPath {
                path: raw.clone(),
                reason,
            })?;
        }
        Ok(Self(raw))
    }

    pub(crate) fn join(&self, segment: &str) -> Result<Self, StorageError> {
        validate_segment(segment).map_err(|reason| StorageError::InvalidPath {
            path: format!("{}/{segment}", self.0),
            reason,
        })?;
        Ok(Self(format!("{}/{segment}", self.0)))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn parent(&self) -> Option<Self> {
        self.0.rsplit_once('/').map(|(parent, _)| Self(parent.to_string()))
    }

    pub(crate) fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, name)| name).unwrap_or(&self.0)
    }

    /// True when `other` is this path or lies underneath it.
    pub(crate) fn contains(&self, other: &BlobPath) -> bool {
        other.0 == self.0
            || (other.0.len() > self.0.len()
                && other.0.starts_with(&self.0)
                && other.0.as_bytes()[self.0.len()] == b'/')
    }

    /// Prefixes the path with the application root used by a backend.
    pub(crate) fn qualified(&self, root: &str) -> String {
        if root.is_empty() {
            self.0.clone()
        } else {
            format!("{root}/{}", self.0)
        }
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_segment(segment: &str) -> Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty path segment");
    }
    if segment == "." || segment == ".." {
        return Err("relative path segment");
    }
    if segment.contains(|ch: char| matches!(ch, '/' | '\\' | ':') || ch.is_control()) {
        return Err("forbidden character in path segment");
    }
    Ok(())
}

/// Stable key for an email: hex SHA-256 of the trimmed, lowercased address.
pub(crate) fn email_key(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

pub(crate) fn user_profile(email: &str) -> BlobPath {
    BlobPath(format!("{USERS}/{}.json", email_key(email)))
}

pub(crate) fn all_courses() -> BlobPath {
    BlobPath(format!("{COURSES}/all_courses.json"))
}

pub(crate) fn all_homework() -> BlobPath {
    BlobPath(format!("{HOMEWORK}/all_homework.json"))
}

pub(crate) fn homework_submissions(homework_id: &str) -> Result<BlobPath, StorageError> {
    BlobPath(SUBMISSIONS.to_string()).join(homework_id)
}

pub(crate) fn student_submission_folder(
    homework_id: &str,
    student_email: &str,
) -> Result<BlobPath, StorageError> {
    homework_submissions(homework_id)?.join(&email_key(student_email))
}

pub(crate) fn submission_document(
    homework_id: &str,
    student_email: &str,
) -> Result<BlobPath, StorageError> {
    student_submission_folder(homework_id, student_email)?.join(SUBMISSION_DOCUMENT)
}

/// The fixed-name document inside a student folder found by enumeration.
pub(crate) fn submission_document_in(folder: &BlobPath) -> Result<BlobPath, StorageError> {
    folder.join(SUBMISSION_DOCUMENT)
}

pub(crate) fn submission_attachment(
    homework_id: &str,
    student_email: &str,
    filename: &str,
) -> Result<BlobPath, StorageError> {
    student_submission_folder(homework_id, student_email)?.join(ATTACHMENTS)?.join(filename)
}

pub(crate) fn sessions() -> BlobPath {
    BlobPath(format!("{AUTH}/sessions.json"))
}

pub(crate) fn login_code(email: &str) -> BlobPath {
    BlobPath(format!("{AUTH}/login_codes/{}.json", email_key(email)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_traversal_and_empty_segments() {
        assert!(BlobPath::parse("users/a.json").is_ok());
        assert!(BlobPath::parse("").is_err());
        assert!(BlobPath::parse("/users/a.json").is_err());
        assert!(BlobPath::parse("users/").is_err());
        assert!(BlobPath::parse("users//a.json").is_err());
        assert!(BlobPath::parse("users/../secrets").is_err());
        assert!(BlobPath::parse("users\\a.json").is_err());
        assert!(BlobPath::parse("users/a:b.json").is_err());
    }

    #[test]
    fn email_key_normalizes_case_and_whitespace() {
        let key = email_key("  Student@Example.COM ");
        assert_eq!(key, email_key("student@example.com"));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn collection_paths_are_deterministic() {
        let key = email_key("a@b.c");
        assert_eq!(user_profile("A@B.C").as_str(), format!("users/{key}.json"));
        assert_eq!(all_courses().as_str(), "courses/all_courses.json");
        assert_eq!(all_homework().as_str(), "homework/all_homework.json");
        assert_eq!(sessions().as_str(), "auth/sessions.json");
        assert_eq!(login_code("a@b.c").as_str(), format!("auth/login_codes/{key}.json"));
        assert_eq!(
            submission_document("hw-1", "a@b.c").unwrap().as_str(),
            format!("submissions/hw-1/{key}/submission.json")
        );
        assert_eq!(
            submission_attachment("hw-1", "a@b.c", "page1.png").unwrap().as_str(),
            format!("submissions/hw-1/{key}/attachments/page1.png")
        );
    }

    #[test]
    fn untrusted_segments_are_validated() {
        assert!(homework_submissions("../users").is_err());
        assert!(submission_attachment("hw-1", "a@b.c", "../../x").is_err());
        assert!(submission_attachment("hw-1", "a@b.c", "").is_err());
    }

    #[test]
    fn parent_file_name_and_containment() {
        let path = BlobPath::parse("submissions/hw/key/submission.json").unwrap();
        assert_eq!(path.file_name(), "submission.json");
        assert_eq!(path.parent().unwrap().as_str(), "submissions/hw/key");

        let folder = BlobPath::parse("submissions/hw").unwrap();
        assert!(folder.contains(&path));
        assert!(folder.contains(&folder));
        assert!(!folder.contains(&BlobPath::parse("submissions/hw2/x").unwrap()));
        assert_eq!(path.qualified("root"), "root/submissions/hw/key/submission.json");
    }
}
