// Posting-date parsing: absolute `datetime` attributes and relative phrases.
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use regex::Regex;

static RELATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s+(minute|hour|day|week|month|year)s?\s+ago").unwrap()
});

/// Parses whatever date text a listing card carries. Absolute forms
/// (`2024-10-01`, `2024-10-01T08:30:00`) are tried first, then relative
/// phrases against `today`. Anything else is absent, never a default date.
pub fn parse_posted_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%SZ"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }
    parse_relative(text, today)
}

/// "3 days ago" -> today minus three days. Months count as 30 days and
/// years as 365, matching how the site rounds its own labels.
pub fn parse_relative(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = text.to_lowercase();
    if lower.contains("today") || lower.contains("just now") {
        return Some(today);
    }
    if lower.contains("yesterday") {
        return Some(today - Duration::days(1));
    }
    let caps = RELATIVE_RE.captures(&lower)?;
    let count: i64 = caps[1].parse().ok()?;
    let days = match &caps[2] {
        "minute" | "hour" => 0,
        "day" => count,
        "week" => count * 7,
        "month" => count * 30,
        "year" => count * 365,
        _ => return None,
    };
    Some(today - Duration::days(days))
}
