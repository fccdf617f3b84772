use std::path::Path;

use crate::api::errors::ApiError;

pub(crate) const MAX_FILENAME_LEN: usize = 128;

/// Attachment names become a path segment in the store; keep them plain.
pub(crate) fn validate_attachment(filename: &str, content_type: &str) -> Result<(), ApiError> {
    let plain = !filename.is_empty()
        && filename.len() <= MAX_FILENAME_LEN
        && !filename.starts_with('.')
        && filename.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'));
    if !plain {
        return Err(ApiError::BadRequest(
            "File name may only contain letters, digits, '.', '-' and '_'".to_string(),
        ));
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .ok_or_else(|| ApiError::BadRequest("File must have an extension".to_string()))?;

    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if mime_allowed_for_extension(&mime, &extension) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "MIME type '{mime}' does not match extension '.{extension}'"
        )))
    }
}

fn mime_allowed_for_extension(mime: &str, extension: &str) -> bool {
    match extension {
        "jpg" | "jpeg" => matches!(mime, "image/jpeg" | "image/jpg"),
        "png" => mime == "image/png",
        "webp" => mime == "image/webp",
        "gif" => mime == "image/gif",
        "heic" => mime == "image/heic",
        "mp3" => matches!(mime, "audio/mpeg" | "audio/mp3"),
        "wav" => matches!(mime, "audio/wav" | "audio/x-wav" | "audio/wave"),
        "m4a" => matches!(mime, "audio/mp4" | "audio/x-m4a"),
        "webm" => matches!(mime, "audio/webm" | "video/webm"),
        "ogg" => matches!(mime, "audio/ogg" | "video/ogg"),
        "mp4" => mime == "video/mp4",
        "mov" => mime == "video/quicktime",
        "pdf" => mime == "application/pdf",
        "txt" => mime == "text/plain",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_media_with_matching_type() {
        assert!(validate_attachment("photo.JPG", "image/jpeg").is_ok());
        assert!(validate_attachment("answer_1.webm", "audio/webm; codecs=opus").is_ok());
        assert!(validate_attachment("clip.mp4", "video/mp4").is_ok());
    }

    #[test]
    fn rejects_odd_names_and_mismatched_types() {
        assert!(validate_attachment("../etc", "text/plain").is_err());
        assert!(validate_attachment(".hidden.png", "image/png").is_err());
        assert!(validate_attachment("noext", "image/png").is_err());
        assert!(validate_attachment("photo.png", "image/jpeg").is_err());
        assert!(validate_attachment("script.sh", "text/plain").is_err());
    }
}
