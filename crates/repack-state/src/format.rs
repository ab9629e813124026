/*
[INPUT]:  Raw sizes, ratios, backend timestamps, task statuses
[OUTPUT]: Display strings for embedding UIs
[POS]:    Presentation helpers - pure functions, no I/O
[UPDATE]: When display conventions change
*/

use chrono::{DateTime, Local, NaiveDateTime};
use repack_adapter::TaskStatus;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MISSING_TIME: &str = "--";
const NAIVE_PATTERNS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

const MINUTE: f64 = 60.0;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;
const MONTH: f64 = 30.4375 * DAY;
const YEAR: f64 = 365.25 * DAY;

/// Human-readable byte count, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut exponent = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && exponent < SIZE_UNITS.len() - 1 {
        scaled /= 1024;
        exponent += 1;
    }
    let value = bytes as f64 / 1024f64.powi(exponent as i32);

    let rendered = format!("{value:.2}");
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{rendered} {}", SIZE_UNITS[exponent])
}

pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

/// Local `YYYY-MM-DD HH:MM:SS`; `--` for empty or unparsable input.
///
/// Backend timestamps come with or without an offset.
pub fn format_time(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return MISSING_TIME.to_string();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return parsed.with_timezone(&Local).format(TIME_FORMAT).to_string();
    }
    for pattern in NAIVE_PATTERNS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, pattern) {
            return parsed.format(TIME_FORMAT).to_string();
        }
    }
    MISSING_TIME.to_string()
}

/// `5 minutes ago` / `in 2 hours`; `--` for empty or unparsable input.
pub fn format_relative_time(value: &str) -> String {
    format_relative_time_at(value, Local::now())
}

/// [`format_relative_time`] against a fixed reference instant.
pub fn format_relative_time_at(value: &str, now: DateTime<Local>) -> String {
    let value = value.trim();
    if value.is_empty() {
        return MISSING_TIME.to_string();
    }
    let Some(then) = parse_instant(value) else {
        return MISSING_TIME.to_string();
    };

    let elapsed = now.signed_duration_since(then).num_seconds();
    let phrase = relative_phrase(elapsed.unsigned_abs() as f64);
    if elapsed < 0 {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

/// Naive timestamps are read as local wall-clock time.
fn parse_instant(value: &str) -> Option<DateTime<Local>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Local));
    }
    NAIVE_PATTERNS
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(value, pattern).ok())
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
}

fn relative_phrase(seconds: f64) -> String {
    let minutes = (seconds / MINUTE).round();
    let hours = (seconds / HOUR).round();
    let days = (seconds / DAY).round();
    let months = (seconds / MONTH).round();

    if seconds < 45.0 {
        "a few seconds".to_string()
    } else if seconds < 90.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{minutes} minutes")
    } else if minutes < 90.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{hours} hours")
    } else if hours < 36.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{days} days")
    } else if days < 46.0 {
        "a month".to_string()
    } else if months < 11.0 {
        format!("{months} months")
    } else if months < 18.0 {
        "a year".to_string()
    } else {
        format!("{} years", (seconds / YEAR).round())
    }
}

pub fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "Pending",
        TaskStatus::Downloading => "Downloading",
        TaskStatus::Extracting => "Extracting",
        TaskStatus::Packaging => "Packaging",
        TaskStatus::Completed => "Completed",
        TaskStatus::Failed => "Failed",
        TaskStatus::Cancelled => "Cancelled",
    }
}
