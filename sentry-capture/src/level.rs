use sentry::Level;

use crate::datum::Datum;

/// Maps a severity keyword to the transport's level. Anything outside the
/// closed set, including a missing value, maps to `Info`.
pub fn to_severity(level: Option<&Datum>) -> Level {
    match level.and_then(Datum::as_text) {
        Some("debug") => Level::Debug,
        Some("info") => Level::Info,
        Some("warning") => Level::Warning,
        Some("error") => Level::Error,
        Some("fatal") => Level::Fatal,
        _ => Level::Info,
    }
}
