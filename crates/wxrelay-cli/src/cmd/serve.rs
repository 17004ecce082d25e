use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use wxrelay_core::Relay;

use super::load_config;

pub fn run(path: &Path, port: Option<u16>) -> anyhow::Result<()> {
    let config = load_config(path)?;
    for w in config.validate() {
        tracing::warn!(level = ?w.level, "{}", w.message);
    }
    let port = port.unwrap_or(config.server.port);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let relay = Arc::new(
            Relay::from_config(config)
                .await
                .context("failed to open relay")?,
        );
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
            .await
            .with_context(|| format!("cannot bind port {port}"))?;

        tokio::select! {
            res = wxrelay_server::serve_on(relay, listener) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
