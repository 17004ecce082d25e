pub mod error;
pub mod routes;
pub mod scheduler;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use wxrelay_core::Relay;

/// Build the axum Router with all operator routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(relay: Arc<Relay>) -> Router {
    let app_state = state::AppState::new(relay);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Jobs
        .route("/executeSsbJob", post(routes::jobs::execute_signals))
        .route("/executeSWTJob", post(routes::jobs::execute_bulletins))
        .route(
            "/getSpecialWeatherTips",
            post(routes::jobs::preview_bulletins),
        )
        // Cache
        .route("/getAllCacheData", get(routes::cache::get_all))
        .route("/clearRequestCaches", post(routes::cache::clear_signals))
        .route("/clearTipCaches", post(routes::cache::clear_bulletins))
        .route("/enableExecute", post(routes::cache::enable_execute))
        // Health
        .route("/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Bind `0.0.0.0:<port>`, start the job scheduler and serve until shutdown.
pub async fn serve(relay: Arc<Relay>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(relay, listener).await
}

/// Serve on a pre-bound listener.
///
/// Lets the caller read the actual port first when binding port 0.
pub async fn serve_on(relay: Arc<Relay>, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(relay.clone());
    let jobs = scheduler::spawn(relay);

    tracing::info!("relay listening on http://localhost:{actual_port}");

    let served = axum::serve(listener, app).await;
    for job in jobs {
        job.abort();
    }
    served?;
    Ok(())
}
