//! Student record endpoints.
//!
//! Restricted roles change students through approval requests; the update
//! endpoint is for admins acting directly.

use academy_core::types::DbId;
use academy_lifecycle::StudentUpdate;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/students/{student_id}
pub async fn get_student(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(student_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let student = state.academy.conversion.get(student_id).await?;
    Ok(Json(DataResponse { data: student }))
}

/// PUT /api/v1/students/{student_id}
pub async fn update_student(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(student_id): Path<DbId>,
    Json(input): Json<StudentUpdate>,
) -> AppResult<impl IntoResponse> {
    let student = state
        .academy
        .conversion
        .update_student(student_id, input, Some(admin.user_id))
        .await?;
    Ok(Json(DataResponse { data: student }))
}

/// GET /api/v1/students/{student_id}/approvals
pub async fn list_approvals(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(student_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let requests = state.academy.approvals.list_for_student(student_id).await?;
    Ok(Json(DataResponse { data: requests }))
}
