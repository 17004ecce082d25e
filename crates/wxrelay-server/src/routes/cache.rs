use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use wxrelay_core::types::JobKind;

use crate::error::AppError;
use crate::state::AppState;

/// GET /getAllCacheData: kill switch plus every cached entry of both jobs.
pub async fn get_all(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let snapshot = app.relay.cache_snapshot().await?;
    Ok(Json(json!({
        "message": format!("Found {} cache entries.", snapshot.entries.len()),
        "count": snapshot.entries.len(),
        "data": snapshot,
    })))
}

async fn clear(app: AppState, kind: JobKind) -> Result<Json<serde_json::Value>, AppError> {
    let removed = app.relay.clear(kind).await?;
    Ok(Json(json!({
        "message": format!("Cleared {removed} {} caches.", kind.unit().trim_end_matches('s')),
        "count": removed,
    })))
}

/// POST /clearRequestCaches: drop every signal entry.
pub async fn clear_signals(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    clear(app, JobKind::Signals).await
}

/// POST /clearTipCaches: drop every bulletin entry.
pub async fn clear_bulletins(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    clear(app, JobKind::Bulletins).await
}

#[derive(Deserialize)]
pub struct EnableBody {
    #[serde(default)]
    enable: bool,
}

/// POST /enableExecute: `{"enable": true}` clears the kill switch, anything
/// else sets it. A request without a JSON body disables execution.
pub async fn enable_execute(
    State(app): State<AppState>,
    body: Option<Json<EnableBody>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let enable = body.is_some_and(|Json(b)| b.enable);
    app.relay.set_enabled(enable).await?;
    let message = if enable {
        "Execution enabled"
    } else {
        "Execution disabled"
    };
    Ok(Json(json!({ "message": message, "enabled": enable })))
}
