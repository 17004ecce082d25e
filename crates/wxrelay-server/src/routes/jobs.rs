use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use wxrelay_core::types::JobKind;
use wxrelay_core::{CycleReport, CycleStatus};

use crate::error::AppError;
use crate::state::AppState;

/// Work done (210), execution disabled (220), anything else (200).
///
/// A cycle without a batch processed nothing, so it answers like an idle one;
/// the body's `report.status` tells the two apart.
pub fn cycle_status_code(status: CycleStatus) -> StatusCode {
    let code = match status {
        CycleStatus::Idle | CycleStatus::Aborted => 200,
        CycleStatus::Processed => 210,
        CycleStatus::Disabled => 220,
    };
    StatusCode::from_u16(code).unwrap_or(StatusCode::OK)
}

async fn execute(
    app: AppState,
    kind: JobKind,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let report: CycleReport = app.relay.run(kind).await?;
    let status = cycle_status_code(report.status);
    Ok((
        status,
        Json(json!({
            "message": report.message,
            "count": report.processed,
            "report": report,
        })),
    ))
}

/// POST /executeSsbJob: run one signals cycle.
pub async fn execute_signals(
    State(app): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    execute(app, JobKind::Signals).await
}

/// POST /executeSWTJob: run one bulletins cycle.
pub async fn execute_bulletins(
    State(app): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    execute(app, JobKind::Bulletins).await
}

/// POST /getSpecialWeatherTips: current bulletin batch, nothing dispatched.
pub async fn preview_bulletins(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let records = app.relay.preview_bulletins().await?;
    Ok(Json(json!({
        "message": format!("Fetched {} tips.", records.len()),
        "count": records.len(),
        "data": records,
    })))
}
