//! Send one notification and report what happened. No retries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::delivery::{DeliveryChannel, MessageFormatter};
use crate::types::{describe_record, DispatchOutcome, JobKind, TrackedRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    New,
    Rollback,
}

impl DispatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchKind::New => "new",
            DispatchKind::Rollback => "rollback",
        }
    }
}

pub struct Dispatcher {
    channel: Arc<dyn DeliveryChannel>,
    formatter: MessageFormatter,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn DeliveryChannel>, formatter: MessageFormatter) -> Self {
        Self { channel, formatter }
    }

    /// Only an explicit `success: true` from the channel counts as delivered.
    pub async fn dispatch(
        &self,
        job: JobKind,
        record: &TrackedRecord,
        kind: DispatchKind,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        let message = match kind {
            DispatchKind::New => self.formatter.announce(job, record, now),
            DispatchKind::Rollback => self.formatter.retract(job, record, now),
        };

        let reason = match self.channel.send(&message).await {
            Ok(ack) if ack.success => {
                info!(
                    job = %job,
                    kind = kind.as_str(),
                    code = %record.code,
                    sequence_id = record.sequence_id,
                    "notification delivered"
                );
                return DispatchOutcome::Delivered;
            }
            Ok(_) => "channel did not acknowledge the message".to_string(),
            Err(e) => e.to_string(),
        };

        warn!(
            job = %job,
            kind = kind.as_str(),
            error = %reason,
            "error processing record: {}",
            describe_record(record)
        );
        DispatchOutcome::DeliveryFailed { reason }
    }
}
