use academy_core::error::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `academy_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A request body that failed its declared field constraints.
    #[error("Invalid request: {0}")]
    InvalidInput(#[from] validator::ValidationErrors),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::InvalidInput(errors) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                errors.to_string(),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a domain error onto an HTTP status, a stable code and a message.
///
/// Guard failures are 422; seat and enrolment clashes are 409.
fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    let status = match err {
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::InvalidTransition(_)
        | CoreError::BatchRequired
        | CoreError::TrialBatchRequired => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::CapacityReached { .. }
        | CoreError::AlreadyEnrolled { .. }
        | CoreError::Conflict(_) => StatusCode::CONFLICT,
        CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            return internal();
        }
    };

    let message = match err {
        CoreError::NotFound { entity, id } => format!("{entity} with id {id} not found"),
        CoreError::Validation(msg)
        | CoreError::InvalidTransition(msg)
        | CoreError::Conflict(msg)
        | CoreError::Unauthorized(msg)
        | CoreError::Forbidden(msg) => msg.clone(),
        other => other.to_string(),
    };

    (status, err.code(), message)
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
