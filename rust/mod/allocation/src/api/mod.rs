mod allocations;
mod directory;
mod history;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderMap;

use crate::service::AllocationService;

/// Shared application state.
pub type AppState = Arc<AllocationService>;

/// Header carrying the acting user's profile id.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Build the allocation API router.
///
/// Routes (under `/allocation/v1`):
/// - `GET    /colleges/{college_id}/allocations`        list
/// - `GET    /colleges/{college_id}/allocations/stats`  stats
/// - `POST   /allocations`                              create
/// - `GET    /allocations/{id}`                         get
/// - `PATCH  /allocations/{id}`                         merge-patch update
/// - `DELETE /allocations/{id}`                         delete with history
/// - `POST   /allocations/{id}/allocate`                allocate to student
/// - `GET    /allocations/{id}/history`                 audit trail
/// - `PUT    /students/{id}`, `PUT /profiles/{id}`      name directory
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/allocation/v1", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(allocations::routes())
        .merge(history::routes())
        .merge(directory::routes())
}

/// Actor id from the request headers, if present and non-blank.
fn actor(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
