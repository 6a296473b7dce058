//! Staff-facing lead endpoints: intake, transitions, trials, conversion.

use academy_core::status::LeadStatus;
use academy_core::types::{Date, DbId, Timestamp};
use academy_db::models::lead::{CreateLead, Lead, LeadSource};
use academy_lifecycle::{Attendance, ConversionRequest, SkillReportInput, TransitionFields};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::query::LimitParams;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLeadRequest {
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub date_of_birth: Option<Date>,
    #[serde(default = "default_source")]
    pub source: LeadSource,
    #[validate(range(min = 1))]
    pub center_id: DbId,
    pub assigned_user_id: Option<DbId>,
    pub next_follow_up_at: Option<Timestamp>,
}

fn default_source() -> LeadSource {
    LeadSource::Manual
}

impl From<CreateLeadRequest> for CreateLead {
    fn from(req: CreateLeadRequest) -> Self {
        CreateLead {
            full_name: req.full_name,
            phone: req.phone,
            email: req.email,
            date_of_birth: req.date_of_birth,
            source: req.source,
            center_id: req.center_id,
            assigned_user_id: req.assigned_user_id,
            next_follow_up_at: req.next_follow_up_at,
        }
    }
}

/// A newly created lead together with its self-service token.
#[derive(Debug, Serialize)]
pub struct CreatedLead {
    #[serde(flatten)]
    pub lead: Lead,
    pub public_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransitionRequest {
    pub status: LeadStatus,
    #[validate(length(max = 4000))]
    pub comment: Option<String>,
    #[serde(flatten)]
    pub fields: TransitionFields,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AttendanceRequest {
    pub attendance: Attendance,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

/// POST /api/v1/leads
pub async fn create_lead(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateLeadRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let lead = state
        .academy
        .leads
        .create_lead(input.into(), Some(auth.user_id))
        .await?;
    let public_token = lead.public_token.clone();
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedLead { lead, public_token },
        }),
    ))
}

/// GET /api/v1/leads/{lead_id}
pub async fn get_lead(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(lead_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let lead = state.academy.engine.get_lead(lead_id).await?;
    Ok(Json(DataResponse { data: lead }))
}

/// POST /api/v1/leads/{lead_id}/transition
///
/// Move a lead to `status`, applying any field changes in the same unit of
/// work. A same-status call only updates fields.
pub async fn transition(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(lead_id): Path<DbId>,
    Json(input): Json<TransitionRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let TransitionRequest {
        status,
        comment,
        mut fields,
    } = input;
    fields.comment = comment;

    let lead = state
        .academy
        .engine
        .transition(lead_id, status, fields, Some(auth.user_id))
        .await?;
    Ok(Json(DataResponse { data: lead }))
}

/// POST /api/v1/leads/{lead_id}/attendance
pub async fn mark_attendance(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(lead_id): Path<DbId>,
    Json(input): Json<AttendanceRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let lead = state
        .academy
        .engine
        .mark_attendance(lead_id, input.attendance, input.note, Some(auth.user_id))
        .await?;
    Ok(Json(DataResponse { data: lead }))
}

/// POST /api/v1/leads/{lead_id}/nudge
pub async fn nudge(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(lead_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let lead = state
        .academy
        .engine
        .nudge(lead_id, Some(auth.user_id))
        .await?;
    Ok(Json(DataResponse { data: lead }))
}

/// POST /api/v1/leads/{lead_id}/skill-reports
pub async fn add_skill_report(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(lead_id): Path<DbId>,
    Json(input): Json<SkillReportInput>,
) -> AppResult<impl IntoResponse> {
    let lead = state
        .academy
        .leads
        .add_skill_report(lead_id, Some(auth.user_id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: lead })))
}

/// GET /api/v1/leads/{lead_id}/audit?limit=
///
/// Newest first; `limit` defaults to 50 and is capped at 500.
pub async fn list_audit(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(lead_id): Path<DbId>,
    Query(params): Query<LimitParams>,
) -> AppResult<impl IntoResponse> {
    let entries = state
        .academy
        .audit
        .list_for_lead(lead_id, params.limit)
        .await?;
    Ok(Json(DataResponse { data: entries }))
}

/// GET /api/v1/leads/{lead_id}/audit/verify
pub async fn verify_audit(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(lead_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let verification = state.academy.audit.verify_chain(lead_id).await?;
    if !verification.is_intact() {
        tracing::warn!(
            lead_id,
            first_broken_entry = ?verification.first_broken_entry,
            "Audit chain broken"
        );
    }
    Ok(Json(DataResponse { data: verification }))
}

/// POST /api/v1/leads/{lead_id}/convert
pub async fn convert(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(lead_id): Path<DbId>,
    Json(input): Json<ConversionRequest>,
) -> AppResult<impl IntoResponse> {
    let student = state
        .academy
        .conversion
        .convert(lead_id, input, Some(auth.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: student })))
}

/// POST /api/v1/leads/{lead_id}/verify-payment
///
/// Enrol the lead from the subscription the parent staged.
pub async fn verify_payment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(lead_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let student = state
        .academy
        .conversion
        .verify_payment(lead_id, Some(auth.user_id))
        .await?;
    Ok(Json(DataResponse { data: student }))
}

/// GET /api/v1/leads/{lead_id}/approvals
pub async fn list_approvals(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(lead_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let requests = state.academy.approvals.list_for_lead(lead_id).await?;
    Ok(Json(DataResponse { data: requests }))
}
