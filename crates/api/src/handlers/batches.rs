//! Batch management and occupancy endpoints.

use academy_core::types::DbId;
use academy_db::models::batch::{CreateBatch, UpdateBatch};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveTime;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::query::DateParams;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchRequest {
    #[validate(range(min = 1))]
    pub center_id: DbId,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 7))]
    pub days_of_week: Vec<i16>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[validate(range(min = 1, max = 500))]
    pub max_capacity: i32,
    pub coach_id: Option<DbId>,
}

impl From<CreateBatchRequest> for CreateBatch {
    fn from(req: CreateBatchRequest) -> Self {
        CreateBatch {
            center_id: req.center_id,
            name: req.name,
            days_of_week: req.days_of_week,
            start_time: req.start_time,
            end_time: req.end_time,
            max_capacity: req.max_capacity,
            coach_id: req.coach_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBatchRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 7))]
    pub days_of_week: Option<Vec<i16>>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    #[validate(range(min = 1, max = 500))]
    pub max_capacity: Option<i32>,
    pub is_active: Option<bool>,
}

impl From<UpdateBatchRequest> for UpdateBatch {
    fn from(req: UpdateBatchRequest) -> Self {
        UpdateBatch {
            name: req.name,
            days_of_week: req.days_of_week,
            start_time: req.start_time,
            end_time: req.end_time,
            max_capacity: req.max_capacity,
            is_active: req.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignCoachRequest {
    pub coach_id: Option<DbId>,
}

/// POST /api/v1/batches
pub async fn create_batch(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CreateBatchRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let batch = state.academy.roster.create_batch(input.into()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: batch })))
}

/// GET /api/v1/batches/{batch_id}
pub async fn get_batch(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let batch = state.academy.roster.get(batch_id).await?;
    Ok(Json(DataResponse { data: batch }))
}

/// PUT /api/v1/batches/{batch_id}
///
/// Capacity may not be lowered below today's occupancy.
pub async fn update_batch(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
    Json(input): Json<UpdateBatchRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let batch = state
        .academy
        .roster
        .update_batch(batch_id, input.into())
        .await?;
    Ok(Json(DataResponse { data: batch }))
}

/// PUT /api/v1/batches/{batch_id}/coach
pub async fn assign_coach(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
    Json(input): Json<AssignCoachRequest>,
) -> AppResult<impl IntoResponse> {
    let batch = state
        .academy
        .roster
        .assign_coach(batch_id, input.coach_id)
        .await?;
    Ok(Json(DataResponse { data: batch }))
}

/// DELETE /api/v1/batches/{batch_id}
pub async fn delete_batch(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<StatusCode> {
    state
        .academy
        .roster
        .delete_batch(batch_id, Some(admin.user_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/batches/{batch_id}/occupancy?date=
pub async fn occupancy(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
    Query(params): Query<DateParams>,
) -> AppResult<impl IntoResponse> {
    let occupancy = state
        .academy
        .capacity
        .occupancy(batch_id, params.date)
        .await?;
    Ok(Json(DataResponse { data: occupancy }))
}

/// GET /api/v1/batches/{batch_id}/roster
pub async fn roster(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let leads = state.academy.roster.roster(batch_id).await?;
    Ok(Json(DataResponse { data: leads }))
}
