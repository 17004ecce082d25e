//! Reduce a fetched batch to one canonical record per tracked code.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;

use crate::clock;
use crate::types::TrackedRecord;

/// Seconds until the record expires. `None` when it has no expiry or the
/// expiry does not parse.
pub fn remaining_ttl(record: &TrackedRecord, now: DateTime<Utc>, offset: FixedOffset) -> Option<i64> {
    record
        .expiry_time
        .as_deref()
        .and_then(|expiry| clock::ttl_seconds(expiry, now, offset))
}

/// For each tracked code, in configuration order:
///
/// 1. collect records whose code matches case-insensitively;
/// 2. keep the largest `sequence_id` (the first one seen wins a tie);
/// 3. drop it when its expiry is already reached.
///
/// Surviving records carry the tracked spelling of their code, so feeding the
/// output back in yields the same output.
pub fn normalize(
    batch: &[TrackedRecord],
    tracked_codes: &[String],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<TrackedRecord> {
    let mut out = Vec::with_capacity(tracked_codes.len());

    for code in tracked_codes {
        let mut latest: Option<&TrackedRecord> = None;
        for record in batch.iter().filter(|r| r.code.eq_ignore_ascii_case(code)) {
            if latest.map_or(true, |best| record.sequence_id > best.sequence_id) {
                latest = Some(record);
            }
        }
        let Some(latest) = latest else {
            continue;
        };

        if let Some(ttl) = remaining_ttl(latest, now, offset) {
            if ttl <= 0 {
                debug!(code = %code, sequence_id = latest.sequence_id, ttl, "dropping expired record");
                continue;
            }
        }

        let mut canonical = latest.clone();
        canonical.code = code.clone();
        out.push(canonical);
    }

    out
}
