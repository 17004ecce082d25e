pub mod cache;
pub mod config;
pub mod execute;
pub mod run;
pub mod serve;

use anyhow::Context;
use std::future::Future;
use std::path::Path;
use wxrelay_core::config::Config;
use wxrelay_core::Relay;

/// Load the config, falling back to defaults when the file does not exist.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load_or_default(path).with_context(|| format!("failed to load {}", path.display()))
}

/// Run `op` against a relay built from the config on a fresh runtime.
///
/// One-shot commands try the cache store once: a redb file held by a running
/// `serve` fails fast instead of waiting out the startup retries.
pub fn with_relay<T, F, Fut>(path: &Path, op: F) -> anyhow::Result<T>
where
    F: FnOnce(Relay) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut config = load_config(path)?;
    config.cache.open_attempts = 1;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let relay = Relay::from_config(config)
            .await
            .context("failed to open relay")?;
        op(relay).await
    })
}
