use chrono::{DateTime, Utc};

/// Parse a timestamp as reported by feeds and platform APIs.
///
/// Accepts RFC 3339, RFC 2822 and the `+0000` offset form the Graph API
/// returns. Anything else yields `None` rather than an error so a bad date
/// never blocks an announcement.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
