use axum::extract::State;
use axum::Json;
use serde_json::json;
use wxrelay_core::types::JobKind;

use crate::state::AppState;

/// GET /health: liveness plus the current phase of each job.
pub async fn health(State(app): State<AppState>) -> Json<serde_json::Value> {
    let mut jobs = serde_json::Map::new();
    for kind in JobKind::all() {
        let runner = app.relay.job(*kind);
        jobs.insert(
            kind.as_str().to_string(),
            json!({
                "phase": runner.phase(),
                "running": runner.is_running(),
                "interval_secs": app.relay.config().job(*kind).interval_secs,
            }),
        );
    }
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": app.started_at.to_rfc3339(),
        "jobs": jobs,
    }))
}
