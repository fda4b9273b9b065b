//! Display helpers for counters and timestamps.
//!
//! Time-dependent helpers take `now` explicitly so callers (and tests) decide
//! the reference instant.

use chrono::{DateTime, Utc};

/// 999 → "999", 1500 → "1.5K", 2_500_000 → "2.5M".
pub fn format_compact_number(n: u64) -> String {
    let f = n as f64;
    if n < 1_000 {
        n.to_string()
    } else if n < 1_000_000 {
        format!("{:.1}K", f / 1_000.0)
    } else if n < 1_000_000_000 {
        format!("{:.1}M", f / 1_000_000.0)
    } else {
        format!("{:.1}B", f / 1_000_000_000.0)
    }
}

/// Thousands separators: 1234567 → "1,234,567".
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Whole seconds elapsed since `start`, or `None` if it lies in the future.
pub fn elapsed_seconds(start: DateTime<Utc>, now: DateTime<Utc>) -> Option<i64> {
    let ms = (now - start).num_milliseconds();
    (ms >= 0).then_some(ms / 1000)
}

/// "2d 3h", "4h 12m", "5m 9s" or "42s".
pub fn calculate_uptime(started_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(start) = started_at else {
        return "Unknown".to_string();
    };
    let Some(secs) = elapsed_seconds(start, now) else {
        return "Not started".to_string();
    };

    let minutes = secs / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{days}d {}h", hours % 24)
    } else if hours > 0 {
        format!("{hours}h {}m", minutes % 60)
    } else if minutes > 0 {
        format!("{minutes}m {}s", secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// "3 days ago", "1 hour ago", "Just now".
pub fn format_relative_time(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return "Unknown".to_string();
    };
    let Some(secs) = elapsed_seconds(at, now) else {
        return "In the future".to_string();
    };

    let minutes = secs / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    let plural = |n: i64, unit: &str| {
        format!("{n} {unit}{} ago", if n > 1 { "s" } else { "" })
    };

    if days > 0 {
        plural(days, "day")
    } else if hours > 0 {
        plural(hours, "hour")
    } else if minutes > 0 {
        plural(minutes, "minute")
    } else {
        "Just now".to_string()
    }
}

pub fn updated_label(updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    format_relative_time(updated_at, now)
}

/// Seconds until the next poll, or "Refreshing..." once it is due.
pub fn format_countdown(seconds: u64) -> String {
    if seconds == 0 {
        "Refreshing...".to_string()
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn compact_numbers() {
        assert_eq!(format_compact_number(0), "0");
        assert_eq!(format_compact_number(999), "999");
        assert_eq!(format_compact_number(1_000), "1.0K");
        assert_eq!(format_compact_number(1_500), "1.5K");
        assert_eq!(format_compact_number(2_500_000), "2.5M");
        assert_eq!(format_compact_number(3_200_000_000), "3.2B");
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
        assert_eq!(format_number(100_000), "100,000");
    }

    #[test]
    fn uptime_buckets() {
        let n = now();
        assert_eq!(calculate_uptime(None, n), "Unknown");
        assert_eq!(calculate_uptime(Some(n + Duration::seconds(5)), n), "Not started");
        assert_eq!(calculate_uptime(Some(n - Duration::seconds(42)), n), "42s");
        assert_eq!(calculate_uptime(Some(n - Duration::seconds(309)), n), "5m 9s");
        assert_eq!(calculate_uptime(Some(n - Duration::minutes(252)), n), "4h 12m");
        assert_eq!(calculate_uptime(Some(n - Duration::hours(51)), n), "2d 3h");
    }

    #[test]
    fn uptime_is_monotonic_in_start_time() {
        let n = now();
        let starts: Vec<DateTime<Utc>> = [0i64, 1, 59, 60, 3_599, 3_600, 86_399, 86_400, 400_000]
            .into_iter()
            .map(|s| n - Duration::seconds(s))
            .collect();

        // later start, less uptime
        for pair in starts.windows(2) {
            let (later, earlier) = (pair[0], pair[1]);
            assert!(earlier < later);
            assert!(elapsed_seconds(earlier, n) >= elapsed_seconds(later, n));
        }
    }

    #[test]
    fn relative_time_buckets() {
        let n = now();
        assert_eq!(format_relative_time(None, n), "Unknown");
        assert_eq!(format_relative_time(Some(n + Duration::minutes(1)), n), "In the future");
        assert_eq!(format_relative_time(Some(n - Duration::seconds(30)), n), "Just now");
        assert_eq!(format_relative_time(Some(n - Duration::minutes(1)), n), "1 minute ago");
        assert_eq!(format_relative_time(Some(n - Duration::hours(3)), n), "3 hours ago");
        assert_eq!(format_relative_time(Some(n - Duration::days(2)), n), "2 days ago");
    }

    #[test]
    fn countdown_label() {
        assert_eq!(format_countdown(0), "Refreshing...");
        assert_eq!(format_countdown(12), "12s");
    }
}
