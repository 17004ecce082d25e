//! Upstream sources of tracked records.
//!
//! A feed either returns the whole batch or fails the cycle. Individual
//! items that cannot become a [`TrackedRecord`] are dropped with a warning.

pub mod bulletins;
pub mod signals;

pub use bulletins::BulletinFeed;
pub use signals::SignalFeed;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::FetchError;
use crate::types::TrackedRecord;

#[async_trait]
pub trait SourceFeed: Send + Sync {
    async fn fetch(&self) -> Result<Vec<TrackedRecord>, FetchError>;
}

/// Shared HTTP client for feeds and the webhook. Every request is bounded by
/// `timeout`.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("wxrelay/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Map a non-2xx response to `FetchError::Status`, otherwise return the body.
pub(crate) async fn read_body(response: reqwest::Response) -> Result<String, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    Ok(response.text().await?)
}
