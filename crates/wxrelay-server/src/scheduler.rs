use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use wxrelay_core::error::RelayError;
use wxrelay_core::types::JobKind;
use wxrelay_core::Relay;

/// Spawn one interval loop per job that has `interval_secs` configured.
///
/// A tick that lands while the previous cycle is still in flight is skipped;
/// cycles of the same job never overlap.
pub fn spawn(relay: Arc<Relay>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();
    for kind in JobKind::all() {
        let Some(secs) = relay.config().job(*kind).interval_secs else {
            continue;
        };
        if secs == 0 {
            tracing::warn!(job = %kind, "interval_secs is 0, scheduling disabled");
            continue;
        }
        tracing::info!(job = %kind, every_secs = secs, "scheduling job");
        handles.push(tokio::spawn(run_every(
            relay.clone(),
            *kind,
            Duration::from_secs(secs),
        )));
    }
    handles
}

async fn run_every(relay: Arc<Relay>, kind: JobKind, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if relay.job(kind).is_running() {
            tracing::debug!(job = %kind, "previous cycle still running, tick skipped");
            continue;
        }
        match relay.run(kind).await {
            Ok(report) => tracing::info!(
                job = %kind,
                status = ?report.status,
                processed = report.processed,
                "{}",
                report.message
            ),
            Err(RelayError::AlreadyRunning(_)) => {
                tracing::debug!(job = %kind, "cycle already running, tick skipped");
            }
            Err(e) => tracing::warn!(job = %kind, "scheduled cycle failed: {e}"),
        }
    }
}
