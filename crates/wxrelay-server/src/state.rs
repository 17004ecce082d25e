use chrono::{DateTime, Utc};
use std::sync::Arc;
use wxrelay_core::Relay;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self {
            relay,
            started_at: Utc::now(),
        }
    }
}
