//! Chat message templates.

use chrono::{DateTime, FixedOffset, Utc};

use super::{Attachment, ChatMessage};
use crate::clock;
use crate::types::{JobKind, SignalAction, TrackedRecord};

/// Icons with this prefix have no picture to show.
const NO_CARTOON_PREFIX: &str = "no_cartoon";

#[derive(Debug, Clone)]
pub struct MessageFormatter {
    offset: FixedOffset,
    icon_base_url: Option<String>,
}

impl MessageFormatter {
    pub fn new(offset: FixedOffset, icon_base_url: Option<String>) -> Self {
        Self {
            offset,
            icon_base_url,
        }
    }

    /// Announcement of a new or changed record.
    pub fn announce(&self, job: JobKind, record: &TrackedRecord, now: DateTime<Utc>) -> ChatMessage {
        match job {
            JobKind::Signals => self.signal(record, now),
            JobKind::Bulletins => self.bulletin(record),
        }
    }

    /// Retraction of a record that was announced earlier.
    pub fn retract(&self, job: JobKind, record: &TrackedRecord, now: DateTime<Utc>) -> ChatMessage {
        let past = match record.action {
            Some(SignalAction::Extend) => "extended",
            Some(SignalAction::Cancel) => "cancelled",
            Some(SignalAction::Issue) | None => "issued",
        };
        let subject = match job {
            JobKind::Signals => record.payload.title.clone(),
            JobKind::Bulletins => format!("{} ({})", record.payload.title, record.code),
        };
        ChatMessage {
            text: format!(
                "{}: correction, {subject} was NOT {past}.",
                self.speaker(record, now)
            ),
            attachments: vec![self.attachment(job, record)],
        }
    }

    fn signal(&self, record: &TrackedRecord, now: DateTime<Utc>) -> ChatMessage {
        let action = record.action.map_or("update", SignalAction::as_str);
        let until = self
            .time_of(record.expiry_time.as_deref(), now)
            .map(|t| format!(", valid until {t}"))
            .unwrap_or_default();
        ChatMessage {
            text: format!(
                "{}: {action} {}{until}.",
                self.speaker(record, now),
                record.payload.title
            ),
            attachments: vec![self.attachment(JobKind::Signals, record)],
        }
    }

    fn bulletin(&self, record: &TrackedRecord) -> ChatMessage {
        ChatMessage {
            text: format!("Special weather tips ({})", record.code),
            attachments: vec![self.attachment(JobKind::Bulletins, record)],
        }
    }

    fn attachment(&self, job: JobKind, record: &TrackedRecord) -> Attachment {
        let text = match job {
            JobKind::Signals => {
                let action = record.action.map_or("", SignalAction::as_str);
                let mut text = format!(
                    "Action: {action} ({}:{})",
                    record.created_by, record.last_updated_by
                );
                if let Some(active) = &record.active_time {
                    text.push('\n');
                    text.push_str(active);
                }
                text
            }
            JobKind::Bulletins => record.payload.body.clone(),
        };
        Attachment {
            title: record.payload.title.clone(),
            text,
            color: record.payload.color.clone(),
            thumb_url: self.thumbnail(record),
        }
    }

    fn thumbnail(&self, record: &TrackedRecord) -> Option<String> {
        let base = self.icon_base_url.as_deref()?;
        let icon = record.payload.icon.as_deref()?;
        if icon.is_empty() || icon.starts_with(NO_CARTOON_PREFIX) {
            return None;
        }
        Some(format!("{}/{}", base.trim_end_matches('/'), icon))
    }

    /// `Forecaster (HH:MM)` from the creation time, or `Forecaster` alone.
    fn speaker(&self, record: &TrackedRecord, now: DateTime<Utc>) -> String {
        match self.time_of(record.creation_time.as_deref(), now) {
            Some(t) => format!("Forecaster ({t})"),
            None => "Forecaster".to_string(),
        }
    }

    /// `HH:MM`, prefixed with `tomorrow ` when it falls after today.
    fn time_of(&self, raw: Option<&str>, now: DateTime<Utc>) -> Option<String> {
        let at = clock::parse_any(raw?, self.offset)?;
        let today = now.with_timezone(&self.offset).date_naive();
        let prefix = if at.date_naive() > today { "tomorrow " } else { "" };
        Some(format!("{prefix}{}", at.format("%H:%M")))
    }
}
