//! Small shared helpers.

/// Current wall-clock time, RFC 3339 with millisecond precision.
#[must_use]
pub fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
