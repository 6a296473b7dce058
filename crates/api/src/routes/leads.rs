use axum::routing::{get, post};
use axum::Router;

use crate::handlers::leads;
use crate::state::AppState;

/// ```text
/// POST   /                              create_lead
/// GET    /{lead_id}                     get_lead
/// POST   /{lead_id}/transition          transition
/// POST   /{lead_id}/attendance          mark_attendance
/// POST   /{lead_id}/nudge               nudge
/// POST   /{lead_id}/skill-reports       add_skill_report
/// GET    /{lead_id}/audit               list_audit
/// GET    /{lead_id}/audit/verify        verify_audit
/// POST   /{lead_id}/convert             convert
/// POST   /{lead_id}/verify-payment      verify_payment
/// GET    /{lead_id}/approvals           list_approvals
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(leads::create_lead))
        .route("/{lead_id}", get(leads::get_lead))
        .route("/{lead_id}/transition", post(leads::transition))
        .route("/{lead_id}/attendance", post(leads::mark_attendance))
        .route("/{lead_id}/nudge", post(leads::nudge))
        .route("/{lead_id}/skill-reports", post(leads::add_skill_report))
        .route("/{lead_id}/audit", get(leads::list_audit))
        .route("/{lead_id}/audit/verify", get(leads::verify_audit))
        .route("/{lead_id}/convert", post(leads::convert))
        .route("/{lead_id}/verify-payment", post(leads::verify_payment))
        .route("/{lead_id}/approvals", get(leads::list_approvals))
}
