use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

/// Current time truncated to whole seconds, which is what the stored documents carry.
pub(crate) fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}

pub(crate) fn format_offset(value: OffsetDateTime) -> String {
    value.to_offset(UtcOffset::UTC).format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}
