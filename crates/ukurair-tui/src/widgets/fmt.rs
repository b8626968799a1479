//! Formatting helpers for levels and timestamps.

use std::time::Duration;

use chrono::{DateTime, Local, Utc};

/// `42.0` → `"42 cm"`, `12.5` → `"12.5 cm"`.
pub fn fmt_level(level_cm: f64) -> String {
    let rounded = format!("{level_cm:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    let trimmed = if trimmed == "-0" { "0" } else { trimmed };
    format!("{trimmed} cm")
}

/// Local wall-clock time, `-` when unknown.
pub fn fmt_clock(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(
        || "-".into(),
        |t| t.with_timezone(&Local).format("%H:%M:%S").to_string(),
    )
}

/// Short clock for chart axes.
pub fn fmt_axis_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(String::new, |t| {
        t.with_timezone(&Local).format("%H:%M").to_string()
    })
}

/// `"3s"`, `"1m 5s"`: age of the last update, whole seconds.
pub fn fmt_age(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - since).num_seconds().max(0).unsigned_abs();
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}
