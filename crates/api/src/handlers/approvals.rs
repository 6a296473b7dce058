//! Approval governance endpoints.
//!
//! Restricted roles file requests; approvers and admins resolve them.

use academy_core::approval::ApprovalAction;
use academy_core::types::DbId;
use academy_lifecycle::CreateApproval;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireApprover;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateApprovalRequest {
    pub action: ApprovalAction,
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
    pub lead_id: Option<DbId>,
    pub student_id: Option<DbId>,
}

impl From<CreateApprovalRequest> for CreateApproval {
    fn from(req: CreateApprovalRequest) -> Self {
        CreateApproval {
            action: req.action,
            reason: req.reason,
            lead_id: req.lead_id,
            student_id: req.student_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResolveApprovalRequest {
    pub approved: bool,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

/// POST /api/v1/approvals
pub async fn create_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateApprovalRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let request = state
        .academy
        .approvals
        .create_request(&auth.actor(), input.into())
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: request })))
}

/// GET /api/v1/approvals/pending
pub async fn list_pending(
    RequireApprover(_approver): RequireApprover,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let requests = state.academy.approvals.list_pending().await?;
    Ok(Json(DataResponse { data: requests }))
}

/// GET /api/v1/approvals/{request_id}
pub async fn get_request(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let request = state.academy.approvals.get(request_id).await?;
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/approvals/{request_id}/resolve
///
/// Approving applies the requested change in the same unit of work; if the
/// change fails the request stays pending.
pub async fn resolve_request(
    RequireApprover(approver): RequireApprover,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
    Json(input): Json<ResolveApprovalRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let request = state
        .academy
        .approvals
        .resolve_request(request_id, &approver.actor(), input.approved, input.note)
        .await?;
    Ok(Json(DataResponse { data: request }))
}
