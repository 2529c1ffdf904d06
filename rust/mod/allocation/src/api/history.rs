use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use placement_core::ServiceError;

use crate::model::HistoryEntry;

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/allocations/{id}/history", get(get_history))
}

async fn get_history(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, ServiceError> {
    Ok(Json(svc.get_history(&id)?))
}
