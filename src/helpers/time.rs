use chrono::{DateTime, Utc};

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render epoch seconds for logs; falls back to the raw number when out of range.
pub fn format_unix_secs(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

/// Milliseconds from `now_ms` until `margin_ms` before `exp_secs`; non-positive once inside the margin.
pub fn refresh_delay_millis(exp_secs: i64, margin_ms: i64, now_ms: i64) -> i64 {
    exp_secs
        .saturating_mul(1000)
        .saturating_sub(margin_ms)
        .saturating_sub(now_ms)
}
