use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};

const DATETIME_FORMATS: &[&str] = &[
    "%a, %d %b %Y %I:%M %p",
    "%a, %d %b %Y %H:%M",
    "%d %b %Y %I:%M %p",
    "%d %b %Y %H:%M",
    "%b %d, %Y %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%a, %d %b %Y", "%d %b %Y", "%b %d, %Y", "%Y-%m-%d"];

/// Wall-clock string used for history entries and the "last updated" line.
pub fn clock_string(at: DateTime<Local>) -> String {
    at.format("%H:%M:%S").to_string()
}

/// Best-effort parse of the upstream display date/time into local time.
/// Date-only values resolve to local midnight.
pub fn parse_display_time(display: &str) -> Option<DateTime<Local>> {
    let s = display.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }
    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Local.from_local_datetime(&naive).earliest()
}

/// "Starts in 2h 10m" style countdown to `target`.
pub fn starts_in<Tz: TimeZone>(target: &DateTime<Tz>, now: &DateTime<Local>) -> String {
    let diff = target.clone().with_timezone(&Local) - *now;
    if diff <= chrono::Duration::zero() {
        return "Started already".to_string();
    }
    let mins = diff.num_minutes();
    let hours = mins / 60;
    let days = hours / 24;
    if days > 0 {
        format!("Starts in {days}d {}h", hours % 24)
    } else if hours > 0 {
        format!("Starts in {hours}h {}m", mins % 60)
    } else {
        format!("Starts in {mins}m")
    }
}

pub fn describe_start(display: &str, now: &DateTime<Local>) -> String {
    if display.trim().is_empty() {
        return "No time available".to_string();
    }
    match parse_display_time(display) {
        Some(target) => starts_in(&target, now),
        None => "Invalid time".to_string(),
    }
}
