use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use wxrelay_core::error::RelayError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if let Some(e) = self.0.downcast_ref::<RelayError>() {
            match e {
                RelayError::AlreadyRunning(_) => StatusCode::CONFLICT,
                RelayError::CacheUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                RelayError::SourceFetch(_) => StatusCode::BAD_GATEWAY,
                RelayError::UnknownJob(_) => StatusCode::BAD_REQUEST,
                RelayError::Config(_)
                | RelayError::Io(_)
                | RelayError::Yaml(_)
                | RelayError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
