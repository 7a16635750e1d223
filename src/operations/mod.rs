//! Operations module provides the CLI-facing workflows built on the client

pub mod modlog;
pub mod posts;
pub mod reply;
pub mod thread;

use chrono::DateTime;
use chrono_tz::America::Los_Angeles;
use chrono_tz::Tz;

/// Render a Reddit `created_utc` value in the configured display timezone
pub(crate) fn format_timestamp(created_utc: f64, timezone: &str, pattern: &str) -> String {
    let tz: Tz = timezone.parse().unwrap_or(Los_Angeles);
    match DateTime::from_timestamp(created_utc as i64, 0) {
        Some(utc) => utc.with_timezone(&tz).format(pattern).to_string(),
        None => "unknown time".to_string(),
    }
}

/// Truncate to `max` characters, safely handling UTF-8
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let mut chars = text.chars().take(max.saturating_sub(3)).collect::<String>();
        chars.push_str("...");
        chars
    } else {
        text.to_string()
    }
}
