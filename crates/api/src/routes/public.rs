use axum::routing::post;
use axum::Router;

use crate::handlers::public;
use crate::state::AppState;

/// ```text
/// POST   /{token}/preferences     submit_preferences
/// POST   /{token}/subscription    stage_subscription
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{token}/preferences", post(public::submit_preferences))
        .route("/{token}/subscription", post(public::stage_subscription))
}
