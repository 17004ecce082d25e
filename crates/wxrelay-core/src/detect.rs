//! Classify normalized records against the last dispatched state.

use tracing::{debug, info, warn};

use crate::cache::RecordCache;
use crate::types::{DispatchOutcome, RollbackNotice, SkipReason, TrackedRecord};

/// Verdict for a single record compared with its cached counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Retraction of the cached record when upstream went backwards.
    pub rollback: Option<RollbackNotice>,
    /// `true` when the record must be announced as new or changed.
    pub dispatch: bool,
}

/// Rollback is decided first and independently: a fetched sequence lower
/// than the cached one retracts the cached record, and the lower record is
/// still announced. Only an equal sequence is skipped.
pub fn classify(record: &TrackedRecord, cached: Option<&TrackedRecord>) -> Classification {
    let Some(cached) = cached else {
        return Classification {
            rollback: None,
            dispatch: true,
        };
    };

    let rollback = (record.sequence_id < cached.sequence_id)
        .then(|| RollbackNotice::for_cached(cached.clone()));
    Classification {
        rollback,
        dispatch: record.sequence_id != cached.sequence_id,
    }
}

#[derive(Debug, Default)]
pub struct Detection {
    pub fresh: Vec<TrackedRecord>,
    pub rollbacks: Vec<RollbackNotice>,
    /// Records not dispatched this cycle, each with a `Skipped` outcome.
    pub skipped: Vec<(TrackedRecord, DispatchOutcome)>,
}

fn skip(reason: SkipReason) -> DispatchOutcome {
    DispatchOutcome::Skipped { reason }
}

/// Compare every record with the most recent cache entry for its code.
/// A code whose cache read fails is skipped for this cycle.
pub async fn detect(cache: &RecordCache, records: Vec<TrackedRecord>) -> Detection {
    let mut detection = Detection::default();

    for record in records {
        let cached = match cache.recent_entry(&record.code).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(code = %record.code, error = %e, "cache read failed, skipping record");
                detection.skipped.push((record, skip(SkipReason::CacheUnavailable)));
                continue;
            }
        };

        let verdict = classify(&record, cached.as_ref());
        if let Some(notice) = verdict.rollback {
            info!(
                code = %record.code,
                fetched = record.sequence_id,
                cached = notice.record.sequence_id,
                rollback_by = %notice.rollback_by,
                "rollback detected"
            );
            detection.rollbacks.push(notice);
        }
        if verdict.dispatch {
            detection.fresh.push(record);
        } else {
            debug!(code = %record.code, sequence_id = record.sequence_id, "unchanged");
            detection.skipped.push((record, skip(SkipReason::Unchanged)));
        }
    }

    detection
}
