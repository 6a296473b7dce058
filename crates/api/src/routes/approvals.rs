use axum::routing::{get, post};
use axum::Router;

use crate::handlers::approvals;
use crate::state::AppState;

/// ```text
/// POST   /                          create_request
/// GET    /pending                   list_pending
/// GET    /{request_id}              get_request
/// POST   /{request_id}/resolve      resolve_request
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(approvals::create_request))
        .route("/pending", get(approvals::list_pending))
        .route("/{request_id}", get(approvals::get_request))
        .route("/{request_id}/resolve", post(approvals::resolve_request))
}
