//! Source timestamp parsing.
//!
//! Upstream timestamps carry no zone. They are interpreted in a fixed
//! offset taken from config (`source_utc_offset_hours`).
//!
//! Two shapes appear on the wire:
//! - `15/07/2025 05:15` for active/expiry times
//! - `2025-07-24 06:21:18.0` for creation times

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

const MINUTE_FORMAT: &str = "%d/%m/%Y %H:%M";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Build the source offset from whole hours. Out-of-range values fall back to UTC.
pub fn source_offset(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours.saturating_mul(3600)).unwrap_or_else(|| Utc.fix())
}

fn localize(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    offset.from_local_datetime(&naive).single()
}

/// Parse `dd/mm/yyyy HH:MM`.
pub fn parse_minute(s: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), MINUTE_FORMAT).ok()?;
    localize(naive, offset)
}

/// Parse `yyyy-mm-dd HH:MM:SS[.f]`.
pub fn parse_timestamp(s: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()?;
    localize(naive, offset)
}

/// Accept either wire shape.
pub fn parse_any(s: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    parse_minute(s, offset).or_else(|| parse_timestamp(s, offset))
}

/// Whole seconds from `now` until `expiry`, floored. `None` when unparsable.
pub fn ttl_seconds(expiry: &str, now: DateTime<Utc>, offset: FixedOffset) -> Option<i64> {
    let at = parse_minute(expiry, offset)?;
    let millis = at.with_timezone(&Utc).signed_duration_since(now).num_milliseconds();
    Some(millis.div_euclid(1000))
}
