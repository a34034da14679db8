use time::{
    OffsetDateTime, PrimitiveDateTime, UtcOffset,
    format_description::{FormatItem, well_known::Rfc3339},
    macros::format_description,
};

/// Health check payload.
pub mod health;
/// Long-poll query parameters.
pub mod poll;
/// Room forms and views.
pub mod room;

/// IMF-fixdate as used by `Last-Modified` / `If-Modified-Since`.
const HTTP_DATE: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

fn format_rfc3339(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Format `time` as an HTTP date, dropping sub-second precision.
pub fn format_http_date(time: OffsetDateTime) -> String {
    time.to_offset(UtcOffset::UTC)
        .format(HTTP_DATE)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Parse an HTTP date header value. Unparsable values yield `None`.
pub fn parse_http_date(value: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(value.trim(), HTTP_DATE)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}
