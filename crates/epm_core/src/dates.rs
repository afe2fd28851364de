use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Parses the date shapes seen in feeds and model output. `None` when nothing
/// matches.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|n| n.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|n| n.and_utc())
        })
}

/// Absent, blank or unparseable input becomes the current instant.
pub fn normalize_date(raw: Option<&str>) -> DateTime<Utc> {
    raw.filter(|s| !s.trim().is_empty())
        .and_then(parse_date)
        .unwrap_or_else(Utc::now)
}

pub fn normalize_date_string(raw: Option<&str>) -> String {
    normalize_date(raw).to_rfc3339_opts(SecondsFormat::Millis, true)
}
