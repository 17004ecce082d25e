//! One polling cycle: fetch, normalize, detect, dispatch, commit.
//!
//! ```text
//! Idle -> Fetching -> Normalizing -> Detecting -> Dispatching -> Committing -> Idle
//!             |
//!             +-> Aborted
//! ```
//!
//! A runner never overlaps with itself: a second trigger while a cycle is in
//! flight gets `RelayError::AlreadyRunning`.

use std::sync::{Arc, Mutex};

use chrono::{FixedOffset, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::cache::RecordCache;
use crate::detect::detect;
use crate::dispatch::{DispatchKind, Dispatcher};
use crate::error::{RelayError, Result};
use crate::feed::SourceFeed;
use crate::normalize::{normalize, remaining_ttl};
use crate::types::{DispatchOutcome, JobKind, RecordOutcome, TrackedRecord};

// ---------------------------------------------------------------------------
// Phase and report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Fetching,
    Normalizing,
    Detecting,
    Dispatching,
    Committing,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// The kill switch is set; nothing was contacted.
    Disabled,
    /// The cycle ran and found nothing new.
    Idle,
    /// At least one record was dispatched as new or changed.
    Processed,
    /// The cycle could not get a batch to work on.
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub job: JobKind,
    pub status: CycleStatus,
    /// Records dispatched as new or changed, whatever their outcome.
    pub processed: usize,
    pub committed: usize,
    pub delivery_failures: usize,
    pub skipped: usize,
    pub rollbacks: usize,
    pub message: String,
    /// One line per canonical record: dispatched or skipped, and why.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<RecordOutcome>,
}

impl CycleReport {
    fn new(job: JobKind, status: CycleStatus, message: impl Into<String>) -> Self {
        Self {
            job,
            status,
            processed: 0,
            committed: 0,
            delivery_failures: 0,
            skipped: 0,
            rollbacks: 0,
            message: message.into(),
            outcomes: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// JobRunner
// ---------------------------------------------------------------------------

pub struct JobRunner {
    kind: JobKind,
    tracked_codes: Vec<String>,
    offset: FixedOffset,
    feed: Arc<dyn SourceFeed>,
    cache: RecordCache,
    dispatcher: Arc<Dispatcher>,
    running: tokio::sync::Mutex<()>,
    phase: Mutex<CyclePhase>,
}

impl JobRunner {
    pub fn new(
        kind: JobKind,
        tracked_codes: Vec<String>,
        offset: FixedOffset,
        feed: Arc<dyn SourceFeed>,
        cache: RecordCache,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            kind,
            tracked_codes,
            offset,
            feed,
            cache,
            dispatcher,
            running: tokio::sync::Mutex::new(()),
            phase: Mutex::new(CyclePhase::Idle),
        }
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn tracked_codes(&self) -> &[String] {
        &self.tracked_codes
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    pub fn phase(&self) -> CyclePhase {
        match self.phase.lock() {
            Ok(phase) => *phase,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn enter(&self, phase: CyclePhase) {
        match self.phase.lock() {
            Ok(mut current) => *current = phase,
            Err(poisoned) => *poisoned.into_inner() = phase,
        }
    }

    /// Fetch the current upstream batch without touching cache or channel.
    pub async fn preview(&self) -> Result<Vec<TrackedRecord>> {
        Ok(self.feed.fetch().await?)
    }

    /// Run one cycle, or refuse when one is already in flight.
    pub async fn run(&self) -> Result<CycleReport> {
        let _running = self
            .running
            .try_lock()
            .map_err(|_| RelayError::AlreadyRunning(self.kind))?;
        let report = self.cycle().await;
        info!(
            job = %self.kind,
            status = ?report.status,
            processed = report.processed,
            committed = report.committed,
            delivery_failures = report.delivery_failures,
            rollbacks = report.rollbacks,
            "{}",
            report.message
        );
        Ok(report)
    }

    async fn cycle(&self) -> CycleReport {
        let kind = self.kind;

        match self.cache.is_disabled().await {
            Ok(true) => {
                return CycleReport::new(kind, CycleStatus::Disabled, "Execution is disabled.")
            }
            Ok(false) => {}
            Err(e) => {
                error!(job = %kind, error = %e, "kill switch unreadable, not running");
                return CycleReport::new(
                    kind,
                    CycleStatus::Aborted,
                    format!("Kill switch unreadable: {e}"),
                );
            }
        }

        self.enter(CyclePhase::Fetching);
        let batch = match self.feed.fetch().await {
            Ok(batch) => batch,
            Err(e) => {
                self.enter(CyclePhase::Aborted);
                error!(job = %kind, error = %e, "source fetch failed");
                return CycleReport::new(
                    kind,
                    CycleStatus::Aborted,
                    format!("Source fetch failed: {e}"),
                );
            }
        };

        self.enter(CyclePhase::Normalizing);
        let now = Utc::now();
        let records = normalize(&batch, &self.tracked_codes, now, self.offset);
        info!(job = %kind, fetched = batch.len(), unique = records.len(), "batch normalized");

        self.enter(CyclePhase::Detecting);
        let detection = detect(&self.cache, records).await;

        self.enter(CyclePhase::Dispatching);
        let dispatcher = &self.dispatcher;
        let outcomes = join_all(
            detection
                .fresh
                .iter()
                .map(|r| dispatcher.dispatch(kind, r, DispatchKind::New, now)),
        )
        .await;
        let rollback_outcomes = join_all(
            detection
                .rollbacks
                .iter()
                .map(|n| dispatcher.dispatch(kind, &n.record, DispatchKind::Rollback, now)),
        )
        .await;

        self.enter(CyclePhase::Committing);
        let delivered: Vec<&TrackedRecord> = detection
            .fresh
            .iter()
            .zip(&outcomes)
            .filter(|(_, outcome)| outcome.is_delivered())
            .map(|(record, _)| record)
            .collect();
        let commits = join_all(delivered.into_iter().map(|record| async move {
            let ttl = remaining_ttl(record, Utc::now(), self.offset);
            self.cache.commit(record, ttl).await.map_err(|e| {
                warn!(job = %kind, code = %record.code, error = %e, "cache commit failed");
                format!("cache commit failed: {e}")
            })
        }))
        .await;
        self.enter(CyclePhase::Idle);

        let committed = commits.iter().filter(|c| c.is_ok()).count();
        let processed = detection.fresh.len();

        // A delivered record whose commit failed counts as a failed delivery.
        let mut commit_results = commits.into_iter();
        let mut record_outcomes: Vec<RecordOutcome> = detection
            .fresh
            .iter()
            .zip(outcomes)
            .map(|(record, outcome)| {
                let outcome = match outcome {
                    DispatchOutcome::Delivered => match commit_results.next() {
                        Some(Err(reason)) => DispatchOutcome::DeliveryFailed { reason },
                        _ => DispatchOutcome::Delivered,
                    },
                    other => other,
                };
                RecordOutcome::new(record, outcome)
            })
            .collect();
        record_outcomes.extend(
            detection
                .skipped
                .iter()
                .map(|(record, outcome)| RecordOutcome::new(record, outcome.clone())),
        );

        let mut report = CycleReport::new(
            kind,
            if processed == 0 {
                CycleStatus::Idle
            } else {
                CycleStatus::Processed
            },
            format!("Processed {processed} {}.", kind.unit()),
        );
        report.processed = processed;
        report.committed = committed;
        report.delivery_failures = processed - committed
            + rollback_outcomes.iter().filter(|o| !o.is_delivered()).count();
        report.skipped = detection.skipped.len();
        report.rollbacks = detection.rollbacks.len();
        report.outcomes = record_outcomes;
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
