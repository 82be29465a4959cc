//! Retry Timing
//!
//! Exponential backoff schedule and `Retry-After` interpretation.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Delay before the retry that follows failed attempt `attempt` (0-based):
/// `base`, `2 * base`, `4 * base`, ...
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2f64.powi(attempt.min(i32::MAX as u32) as i32);
    Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// Wait requested by a `Retry-After` header, if it is present and readable.
///
/// Accepts delay-seconds, duration strings such as `1m30s`, and HTTP-dates.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    if let Some(duration) = parse_duration_string(value) {
        return Some(duration);
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let remaining = at.with_timezone(&Utc) - Utc::now();
    Some(remaining.to_std().unwrap_or(Duration::ZERO))
}

/// Parse a duration string like "1m30s" or "2h" into a Duration
fn parse_duration_string(s: &str) -> Option<Duration> {
    let s = s.trim();

    if let Some(stripped) = s.strip_suffix("ms") {
        return stripped.parse::<u64>().ok().map(Duration::from_millis);
    }

    // Compound forms ("1m30s", "2h30m")
    if s.contains('h') || (s.contains('m') && s.contains('s')) {
        let mut total_secs = 0u64;
        let mut current_num = String::new();

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_num.push(c);
                continue;
            }
            let n = current_num.parse::<u64>().ok()?;
            let secs = match c {
                'h' => n.checked_mul(3600)?,
                'm' => n.checked_mul(60)?,
                's' => n,
                _ => return None,
            };
            total_secs = total_secs.checked_add(secs)?;
            current_num.clear();
        }

        if current_num.is_empty() && total_secs > 0 {
            return Some(Duration::from_secs(total_secs));
        }
        return None;
    }

    if let Some(stripped) = s.strip_suffix('s') {
        return stripped
            .parse::<f64>()
            .ok()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    }
    if let Some(stripped) = s.strip_suffix('m') {
        return stripped
            .parse::<u64>()
            .ok()
            .and_then(|mins| mins.checked_mul(60))
            .map(Duration::from_secs);
    }

    None
}
