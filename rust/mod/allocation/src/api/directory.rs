use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::put;
use axum::{Json, Router};

use placement_core::ServiceError;

use crate::error::LedgerError;
use crate::model::NameInput;

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/students/{id}", put(put_student))
        .route("/profiles/{id}", put(put_profile))
}

async fn put_student(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<StatusCode, ServiceError> {
    let body = NameInput::from_json(&body).map_err(LedgerError::from)?;
    svc.upsert_student(&id, &body.full_name)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn put_profile(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<StatusCode, ServiceError> {
    let body = NameInput::from_json(&body).map_err(LedgerError::from)?;
    svc.upsert_profile(&id, &body.full_name)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::testutil::{call, setup};
    use super::*;

    #[tokio::test]
    async fn registered_actor_name_appears_in_history() {
        let (r, _) = setup();
        let (s, _) = call(&r, "PUT", "/allocation/v1/profiles/admin", None,
            Some(json!({"fullName": "Placement Office"}))).await;
        assert_eq!(s, StatusCode::NO_CONTENT);

        let (_, created) = call(&r, "POST", "/allocation/v1/allocations", Some("admin"), Some(json!({
            "collegeId": "c1", "course": "MBA", "batchYear": 2025, "totalQuota": 3,
        }))).await;
        let id = created["id"].as_str().unwrap();
        let (_, history) = call(&r, "GET", &format!("/allocation/v1/allocations/{id}/history"), None, None).await;
        assert_eq!(history[0]["performedByName"], "Placement Office");
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let (r, _) = setup();
        let (s, body) = call(&r, "PUT", "/allocation/v1/students/s1", None,
            Some(json!({"fullName": ""}))).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(body["fields"][0]["field"], "fullName");

        let (s, body) = call(&r, "PUT", "/allocation/v1/profiles/p1", None,
            Some(json!({"fullName": 12}))).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(body["fields"][0]["message"], "must be a string");
    }
}
