//! Weather-signal feed.
//!
//! `GET <url>` returns:
//! ```json
//! { "SignalRequestList": { "SignalRequest": [ { "id": "10", "signalCode": "wts", ... } ] } }
//! ```
//! `SignalRequest` may also be a single object. Time objects arrive either as
//! a plain string or as `{"#content": "...", "-class": "sql-timestamp"}`.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::{read_body, SourceFeed};
use crate::error::FetchError;
use crate::types::{RecordPayload, SignalAction, TrackedRecord};

const SIGNAL_COLOR: &str = "red";

pub struct SignalFeed {
    client: reqwest::Client,
    url: String,
}

impl SignalFeed {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SourceFeed for SignalFeed {
    async fn fetch(&self) -> Result<Vec<TrackedRecord>, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        let body = read_body(response).await?;
        let json: Value =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        let records = parse_signal_batch(&json)?;
        info!(fetched = records.len(), "signal batch fetched");
        Ok(records)
    }
}

/// Unwrap the envelope and convert each item, dropping malformed ones.
pub fn parse_signal_batch(json: &Value) -> Result<Vec<TrackedRecord>, FetchError> {
    let items = json
        .get("SignalRequestList")
        .and_then(|list| list.get("SignalRequest"))
        .ok_or_else(|| {
            FetchError::Shape("SignalRequestList or SignalRequest missing".to_string())
        })?;

    let items: Vec<&Value> = match items {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![items],
        Value::Null => Vec::new(),
        other => {
            return Err(FetchError::Shape(format!(
                "SignalRequest must be a list, got {other}"
            )))
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match parse_signal(item) {
            Ok(record) => records.push(record),
            Err(reason) => warn!(%reason, "dropping malformed signal request"),
        }
    }
    Ok(records)
}

fn text(item: &Value, field: &str) -> Option<String> {
    match item.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => obj
            .get("#content")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn parse_signal(item: &Value) -> Result<TrackedRecord, String> {
    let code = text(item, "signalCode").ok_or("missing signalCode")?;
    let raw_id = text(item, "id").ok_or_else(|| format!("{code}: missing id"))?;
    let sequence_id = raw_id
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("{code}: non-numeric id '{raw_id}'"))?;

    let mut record = TrackedRecord::new(code, sequence_id);
    record.action = text(item, "action").and_then(|a| SignalAction::parse(&a));
    record.active_time = text(item, "activeTime");
    record.expiry_time = text(item, "expiryTime");
    record.creation_time = text(item, "creationTime");
    record.created_by = text(item, "createdBy").unwrap_or_default();
    record.last_updated_by = text(item, "lastUpdatedBy").unwrap_or_default();
    record.payload = RecordPayload {
        title: text(item, "signalName").unwrap_or_else(|| record.code.clone()),
        body: String::new(),
        icon: text(item, "signalIcon"),
        color: SIGNAL_COLOR.to_string(),
    };
    Ok(record)
}
