//! Window bucketing and civil-time formatting.
//!
//! The deployment runs in a single fixed civil offset (no DST rules) rather
//! than an IANA timezone, matching the source's "always IST" behaviour
//! generalized to a configurable offset.

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Timelike, Utc};

/// A fixed civil offset with a short display label (e.g. `"IST"`).
#[derive(Debug, Clone)]
pub struct CivilZone {
    pub offset: FixedOffset,
    pub label: String,
}

impl CivilZone {
    /// `hours` carries the sign; `minutes` is the unsigned remainder.
    pub fn new(hours: i32, minutes: i32, label: impl Into<String>) -> Self {
        let sign = if hours < 0 { -1 } else { 1 };
        let secs = sign * (hours.abs() * 3600 + minutes.abs() * 60);
        let offset = FixedOffset::east_opt(secs).expect("civil zone offset out of range");
        Self { offset, label: label.into() }
    }

    /// The Indian Standard Time offset used throughout the original deployment.
    pub fn ist() -> Self {
        Self::new(5, 30, "IST")
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    pub fn to_civil(&self, t: DateTime<Utc>) -> DateTime<FixedOffset> {
        t.with_timezone(&self.offset)
    }

    /// `YYYY-MM-DD HH:MM:SS[ LABEL]`
    pub fn format_civil(&self, t: DateTime<Utc>, include_zone: bool) -> String {
        let civil = self.to_civil(t);
        let base = civil.format("%Y-%m-%d %H:%M:%S").to_string();
        if include_zone {
            format!("{} {}", base, self.label)
        } else {
            base
        }
    }
}

/// Zero seconds/sub-seconds and snap the minute down to a multiple of `interval_minutes`.
pub fn floor_to_interval(t: DateTime<Utc>, interval_minutes: i64) -> DateTime<Utc> {
    assert!(interval_minutes > 0, "interval must be positive");
    let minute = t.minute() as i64;
    let floored_minute = minute - (minute % interval_minutes);
    t.with_minute(floored_minute as u32)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .expect("minute/second within valid range")
}

/// Half-open `[start, end)` window of length `interval_minutes` containing `t`.
pub fn window(t: DateTime<Utc>, interval_minutes: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = floor_to_interval(t, interval_minutes);
    let end = start + Duration::minutes(interval_minutes);
    (start, end)
}

/// Deterministic per-window, per-tenant correlation id.
pub fn session_id(
    window: (DateTime<Utc>, DateTime<Utc>),
    prefix: &str,
    user_id: &str,
) -> String {
    let (start, end) = window;
    format!(
        "{prefix}:{}-{}_user_{user_id}",
        start.format("%Y%m%d%H%M"),
        end.format("%Y%m%d%H%M"),
    )
}

/// The next aligned bucket start strictly after `t`.
pub fn next_bucket_start(t: DateTime<Utc>, interval_minutes: i64) -> DateTime<Utc> {
    let (_, end) = window(t, interval_minutes);
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn floor_snaps_to_interval_multiple() {
        let t = dt(2025, 1, 2, 12, 17, 43);
        let floored = floor_to_interval(t, 30);
        assert_eq!(floored, dt(2025, 1, 2, 12, 0, 0));

        let t2 = dt(2025, 1, 2, 12, 47, 9);
        assert_eq!(floor_to_interval(t2, 30), dt(2025, 1, 2, 12, 30, 0));
    }

    #[test]
    fn window_has_expected_length_and_alignment() {
        let t = dt(2025, 1, 2, 12, 17, 43);
        let (start, end) = window(t, 30);
        assert_eq!(start.minute() % 30, 0);
        assert_eq!(start.second(), 0);
        assert_eq!((end - start), Duration::minutes(30));
    }

    #[test]
    fn session_id_is_pure() {
        let w = window(dt(2025, 1, 2, 12, 0, 0), 30);
        let a = session_id(w, "batch", "u1");
        let b = session_id(w, "batch", "u1");
        assert_eq!(a, b);
        assert_eq!(a, "batch:202501021200-202501021230_user_u1");
    }

    #[test]
    fn session_id_differs_by_tenant() {
        let w = window(dt(2025, 1, 2, 12, 0, 0), 30);
        assert_ne!(session_id(w, "batch", "u1"), session_id(w, "batch", "u2"));
    }

    #[test]
    fn civil_zone_formats_with_and_without_label() {
        let ist = CivilZone::ist();
        let t = dt(2025, 1, 2, 6, 30, 0); // 12:00:00 IST
        assert_eq!(ist.format_civil(t, true), "2025-01-02 12:00:00 IST");
        assert_eq!(ist.format_civil(t, false), "2025-01-02 12:00:00");
    }
}
