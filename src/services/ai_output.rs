//! Parsing of free-form text returned by the grading model.
//!
//! The model is asked for JSON but frequently wraps it in a markdown code fence,
//! optionally tagged with a language (```` ```json ````). The fence is removed before parsing.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::db::models::QuestionGrade;

#[derive(Debug, Error)]
pub(crate) enum MalformedOutput {
    #[error("AI output is empty")]
    Empty,
    #[error("AI output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

const FENCE: &str = "```";

pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix(FENCE) {
        // Drop the language tag that may follow the opening fence.
        text = match rest.split_once('\n') {
            Some((tag, body)) if !tag.trim().contains(|ch: char| ch == '{' || ch == '[') => body,
            _ => strip_inline_tag(rest),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix(FENCE) {
        text = rest;
    }
    text.trim()
}

/// Removes a tag glued to a one-line fence body, as in ```` ```json{"a":1}``` ````.
fn strip_inline_tag(rest: &str) -> &str {
    let body = rest.trim_start_matches(|ch: char| ch.is_ascii_alphabetic());
    if body.len() < rest.len() && body.trim_start().starts_with(['{', '[']) {
        body
    } else {
        rest
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, MalformedOutput> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(MalformedOutput::Empty);
    }
    Ok(serde_json::from_str(cleaned)?)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GradesPayload {
    List(Vec<QuestionGrade>),
    Wrapped { grades: Vec<QuestionGrade> },
}

/// Accepts either a bare array of grades or an object with a `grades` array.
pub(crate) fn parse_grades(raw: &str) -> Result<Vec<QuestionGrade>, MalformedOutput> {
    Ok(match parse_json::<GradesPayload>(raw)? {
        GradesPayload::List(grades) | GradesPayload::Wrapped { grades } => grades,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn strips_fences_with_and_without_language_tag() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n[1, 2]\n```\n"), "[1, 2]");
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn one_line_fence_with_glued_tag_parses() {
        let value: Value = parse_json("```json{\"a\":1}```").unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(strip_code_fences("```json [1]```"), "[1]");
        assert_eq!(strip_code_fences("```true```"), "true");
    }

    #[test]
    fn parses_fenced_json() {
        let value: Value = parse_json("```JSON\n{\"ok\": true}\n```").unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(parse_json::<Value>("I could not grade this"), Err(MalformedOutput::Json(_))));
        assert!(matches!(parse_json::<Value>("```\n```"), Err(MalformedOutput::Empty)));
    }

    #[test]
    fn grades_accept_both_shapes() {
        let bare = r#"[{"question_id": "q1", "score": 2, "max_score": 3, "feedback": "ok"}]"#;
        let wrapped = "```json\n{\"grades\": [{\"question_id\": \"q1\", \"score\": 2, \"max_score\": 3}]}\n```";

        let from_bare = parse_grades(bare).unwrap();
        let from_wrapped = parse_grades(wrapped).unwrap();

        assert_eq!(from_bare[0].score, 2.0);
        assert_eq!(from_wrapped[0].question_id, "q1");
        assert_eq!(from_wrapped[0].feedback, "");
    }
}
