use axum::routing::get;
use axum::Router;

use crate::handlers::students;
use crate::state::AppState;

/// ```text
/// GET    /{student_id}              get_student
/// PUT    /{student_id}              update_student
/// GET    /{student_id}/approvals    list_approvals
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{student_id}",
            get(students::get_student).put(students::update_student),
        )
        .route("/{student_id}/approvals", get(students::list_approvals))
}
