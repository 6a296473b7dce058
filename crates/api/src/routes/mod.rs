//! Route tree for `/api/v1`.

pub mod approvals;
pub mod batches;
pub mod health;
pub mod leads;
pub mod public;
pub mod students;

use axum::routing::post;
use axum::Router;

use crate::handlers::sweeps;
use crate::state::AppState;

/// All versioned API routes, nested under `/api/v1` by the router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/leads", leads::router())
        .nest("/students", students::router())
        .nest("/batches", batches::router())
        .nest("/approvals", approvals::router())
        // Token-authorised parent self-service.
        .nest("/public", public::router())
        .route("/admin/sweeps/expiry", post(sweeps::run_expiry))
        .route("/admin/sweeps/nurture", post(sweeps::run_nurture))
}
