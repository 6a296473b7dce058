//! Parent-facing self-service endpoints, authorised by the lead's public
//! token instead of a staff JWT.

use academy_core::status::LeadStatus;
use academy_core::types::{Date, DbId};
use academy_db::models::lead::Lead;
use academy_lifecycle::{PreferenceSubmission, SubscriptionSubmission};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// What a parent sees after a submission; staff-only fields stay hidden.
#[derive(Debug, Serialize)]
pub struct PublicLeadView {
    pub full_name: String,
    pub status: LeadStatus,
    pub trial_batch_id: Option<DbId>,
    pub trial_date: Option<Date>,
}

impl From<Lead> for PublicLeadView {
    fn from(lead: Lead) -> Self {
        Self {
            full_name: lead.full_name,
            status: lead.status,
            trial_batch_id: lead.trial_batch_id,
            trial_date: lead.trial_date,
        }
    }
}

/// POST /api/v1/public/{token}/preferences
pub async fn submit_preferences(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(input): Json<PreferenceSubmission>,
) -> AppResult<impl IntoResponse> {
    let lead = state.academy.leads.submit_preferences(&token, input).await?;
    Ok(Json(DataResponse {
        data: PublicLeadView::from(lead),
    }))
}

/// POST /api/v1/public/{token}/subscription
pub async fn stage_subscription(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(input): Json<SubscriptionSubmission>,
) -> AppResult<impl IntoResponse> {
    let lead = state.academy.leads.stage_subscription(&token, input).await?;
    Ok(Json(DataResponse {
        data: PublicLeadView::from(lead),
    }))
}
