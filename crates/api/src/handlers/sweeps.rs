//! Manual triggers for the periodic sweeps.

use academy_core::types::DbId;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub affected: Vec<DbId>,
}

/// POST /api/v1/admin/sweeps/expiry
///
/// Returns the student ids whose state changed.
pub async fn run_expiry(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let affected = state.academy.expiry.sweep().await?;
    tracing::info!(user_id = admin.user_id, affected = affected.len(), "Expiry sweep run manually");
    Ok(Json(DataResponse {
        data: SweepReport { affected },
    }))
}

/// POST /api/v1/admin/sweeps/nurture
///
/// Returns the lead ids marked lost.
pub async fn run_nurture(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let affected = state.academy.engine.nurture_sweep().await?;
    tracing::info!(user_id = admin.user_id, affected = affected.len(), "Nurture sweep run manually");
    Ok(Json(DataResponse {
        data: SweepReport { affected },
    }))
}
