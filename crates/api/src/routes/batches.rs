use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::batches;
use crate::state::AppState;

/// ```text
/// POST   /                        create_batch
/// GET    /{batch_id}              get_batch
/// PUT    /{batch_id}              update_batch
/// DELETE /{batch_id}              delete_batch
/// PUT    /{batch_id}/coach        assign_coach
/// GET    /{batch_id}/occupancy    occupancy
/// GET    /{batch_id}/roster       roster
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(batches::create_batch))
        .route(
            "/{batch_id}",
            get(batches::get_batch)
                .put(batches::update_batch)
                .delete(batches::delete_batch),
        )
        .route("/{batch_id}/coach", put(batches::assign_coach))
        .route("/{batch_id}/occupancy", get(batches::occupancy))
        .route("/{batch_id}/roster", get(batches::roster))
}
