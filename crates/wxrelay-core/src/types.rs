use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// JobKind
// ---------------------------------------------------------------------------

/// The two independent polling jobs. Each owns its own tracked-code universe
/// and never overlaps with itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Signals,
    Bulletins,
}

impl JobKind {
    pub fn all() -> &'static [JobKind] {
        &[JobKind::Signals, JobKind::Bulletins]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Signals => "signals",
            JobKind::Bulletins => "bulletins",
        }
    }

    /// Noun used in operator status lines ("Processed 2 requests.").
    pub fn unit(self) -> &'static str {
        match self {
            JobKind::Signals => "requests",
            JobKind::Bulletins => "tips",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = crate::error::RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "signals" | "signal" | "ssb" => Ok(JobKind::Signals),
            "bulletins" | "bulletin" | "tips" | "swt" => Ok(JobKind::Bulletins),
            _ => Err(crate::error::RelayError::UnknownJob(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// SignalAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    Issue,
    Extend,
    Cancel,
}

impl SignalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalAction::Issue => "issue",
            SignalAction::Extend => "extend",
            SignalAction::Cancel => "cancel",
        }
    }

    /// Case-insensitive parse; unknown actions yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "issue" => Some(SignalAction::Issue),
            "extend" => Some(SignalAction::Extend),
            "cancel" => Some(SignalAction::Cancel),
            _ => None,
        }
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TrackedRecord
// ---------------------------------------------------------------------------

/// Template data carried through the pipeline untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordPayload {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: String,
}

/// One unit of monitored upstream state: a weather signal or a bulletin.
///
/// This is also the cache value: the last successfully dispatched record for
/// a code is stored as JSON under `<code>:<sequence_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRecord {
    pub code: String,
    pub sequence_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<SignalAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub last_updated_by: String,
    pub payload: RecordPayload,
}

impl TrackedRecord {
    pub fn new(code: impl Into<String>, sequence_id: u64) -> Self {
        Self {
            code: code.into(),
            sequence_id,
            action: None,
            active_time: None,
            expiry_time: None,
            creation_time: None,
            created_by: String::new(),
            last_updated_by: String::new(),
            payload: RecordPayload::default(),
        }
    }
}

/// Fields rendered when a dispatch fails, in display order.
pub const DIAGNOSTIC_FIELDS: &[(&str, fn(&TrackedRecord) -> String)] = &[
    ("action", |r| {
        r.action.map(|a| a.as_str().to_string()).unwrap_or_default()
    }),
    ("activeTime", |r| r.active_time.clone().unwrap_or_default()),
    ("expiryTime", |r| r.expiry_time.clone().unwrap_or_default()),
    ("id", |r| r.sequence_id.to_string()),
    ("code", |r| r.code.clone()),
    ("creationTime", |r| r.creation_time.clone().unwrap_or_default()),
];

/// `action: issue, activeTime: ..., id: 10, ...` for failure logs.
pub fn describe_record(record: &TrackedRecord) -> String {
    DIAGNOSTIC_FIELDS
        .iter()
        .map(|(name, get)| format!("{name}: {}", get(record)))
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// RollbackNotice
// ---------------------------------------------------------------------------

/// A previously announced record that upstream has retracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackNotice {
    /// The cached (higher-sequence) record being retracted.
    pub record: TrackedRecord,
    /// Actor who created the retracted record.
    pub rollback_by: String,
}

impl RollbackNotice {
    pub fn for_cached(record: TrackedRecord) -> Self {
        let rollback_by = record.created_by.clone();
        Self {
            record,
            rollback_by,
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The cache already holds this exact sequence id.
    Unchanged,
    /// The cache could not be read for this code this cycle.
    CacheUnavailable,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::Unchanged => "unchanged",
            SkipReason::CacheUnavailable => "cache_unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Delivered,
    DeliveryFailed { reason: String },
    Skipped { reason: SkipReason },
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered)
    }
}

/// Per-record line of a cycle report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub code: String,
    pub sequence_id: u64,
    pub outcome: DispatchOutcome,
}

impl RecordOutcome {
    pub fn new(record: &TrackedRecord, outcome: DispatchOutcome) -> Self {
        Self {
            code: record.code.clone(),
            sequence_id: record.sequence_id,
            outcome,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
