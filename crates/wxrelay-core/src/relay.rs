//! Composition root: one cache handle, one delivery channel and one runner
//! per job kind, built from [`Config`].

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::cache::{
    CacheSnapshot, CacheStore, MemoryCache, RecordCache, RedbCache, RetryPolicy,
};
use crate::clock;
use crate::config::{CacheBackend, Config};
use crate::delivery::{DeliveryChannel, MessageFormatter, WebhookChannel};
use crate::dispatch::Dispatcher;
use crate::error::{RelayError, Result};
use crate::feed::{http_client, BulletinFeed, SignalFeed, SourceFeed};
use crate::job::{CycleReport, JobRunner};
use crate::types::{JobKind, TrackedRecord};

pub struct Relay {
    config: Config,
    cache: RecordCache,
    signals: Arc<JobRunner>,
    bulletins: Arc<JobRunner>,
}

impl Relay {
    /// Open the configured cache store and wire HTTP feeds and the webhook.
    pub async fn from_config(config: Config) -> Result<Self> {
        let store: Arc<dyn CacheStore> = match &config.cache.backend {
            CacheBackend::Memory => Arc::new(MemoryCache::new()),
            CacheBackend::Redb { path } => {
                let store = RedbCache::open_with_retry(
                    Path::new(path),
                    config.cache.open_attempts,
                    config.cache.retry_delay(),
                )
                .await
                .map_err(|e| RelayError::CacheUnavailable(e.to_string()))?;
                Arc::new(store)
            }
        };

        let client = http_client(config.http_timeout())
            .map_err(|e| RelayError::Config(format!("cannot build HTTP client: {e}")))?;
        let signal_feed = Arc::new(SignalFeed::new(client.clone(), &config.signals.url));
        let bulletin_feed = Arc::new(BulletinFeed::new(
            client.clone(),
            &config.bulletins.url,
            config.bulletins.tracked_codes.clone(),
        ));
        let channel = Arc::new(WebhookChannel::new(client, &config.webhook.url));

        info!(backend = ?config.cache.backend, "relay ready");
        Ok(Self::with_parts(
            config,
            store,
            signal_feed,
            bulletin_feed,
            channel,
        ))
    }

    /// Assemble a relay from explicit collaborators.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn CacheStore>,
        signal_feed: Arc<dyn SourceFeed>,
        bulletin_feed: Arc<dyn SourceFeed>,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Self {
        let offset = clock::source_offset(config.source_utc_offset_hours);
        let cache = RecordCache::new(store, RetryPolicy::from_config(&config.cache));
        let dispatcher = Arc::new(Dispatcher::new(
            channel,
            MessageFormatter::new(offset, config.webhook.icon_base_url.clone()),
        ));

        let runner = |kind: JobKind, feed: Arc<dyn SourceFeed>| {
            Arc::new(JobRunner::new(
                kind,
                config.job(kind).tracked_codes.clone(),
                offset,
                feed,
                cache.clone(),
                dispatcher.clone(),
            ))
        };
        let signals = runner(JobKind::Signals, signal_feed);
        let bulletins = runner(JobKind::Bulletins, bulletin_feed);

        Self {
            config,
            cache,
            signals,
            bulletins,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn job(&self, kind: JobKind) -> &Arc<JobRunner> {
        match kind {
            JobKind::Signals => &self.signals,
            JobKind::Bulletins => &self.bulletins,
        }
    }

    pub async fn run(&self, kind: JobKind) -> Result<CycleReport> {
        self.job(kind).run().await
    }

    /// Kill switch plus every entry in both tracked universes.
    pub async fn cache_snapshot(&self) -> Result<CacheSnapshot> {
        let mut snapshot = CacheSnapshot {
            execution_disabled: self.cache.is_disabled().await?,
            ..CacheSnapshot::default()
        };
        for kind in JobKind::all() {
            self.cache
                .entries(*kind, &self.config.job(*kind).tracked_codes, &mut snapshot)
                .await?;
        }
        Ok(snapshot)
    }

    /// Remove every cached entry of one job. The kill switch is kept.
    pub async fn clear(&self, kind: JobKind) -> Result<u64> {
        let removed = self.cache.clear(&self.config.job(kind).tracked_codes).await?;
        info!(job = %kind, removed, "cache cleared");
        Ok(removed)
    }

    pub async fn is_enabled(&self) -> Result<bool> {
        Ok(!self.cache.is_disabled().await?)
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.cache.set_disabled(!enabled).await?;
        info!(enabled, "execution toggled");
        Ok(())
    }

    /// Current bulletin batch, straight from the feed.
    pub async fn preview_bulletins(&self) -> Result<Vec<TrackedRecord>> {
        self.bulletins.preview().await
    }
}
